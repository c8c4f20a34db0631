use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Ix4};
use std::path::Path;
use thiserror::Error;

pub const IMAGE_SIZE: usize = 224;

pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Error reading image: {0}")]
    Io(#[from] std::io::Error),
}

pub fn decode_image(image_data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    let image_reader =
        image::ImageReader::new(std::io::Cursor::new(image_data)).with_guessed_format()?;

    Ok(image_reader.decode()?)
}

pub fn open_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let image_data = std::fs::read(path)?;
    decode_image(&image_data)
}

/// Resizes to `size`x`size` and normalizes each RGB channel, producing a
/// `[1, 3, size, size]` array.
pub fn normalize_image(image: &DynamicImage, size: usize) -> Array<f32, Ix4> {
    let img = image.resize_exact(size as u32, size as u32, FilterType::Triangle);

    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        for (channel, value) in [r, g, b].into_iter().enumerate() {
            input[[0, channel, y, x]] = (value as f32 / 255. - MEAN[channel]) / STD[channel];
        }
    }

    input
}

pub fn to_tensor<B: Backend>(input: &Array<f32, Ix4>, device: &B::Device) -> Tensor<B, 4> {
    let shape: [usize; 4] = [
        input.shape()[0],
        input.shape()[1],
        input.shape()[2],
        input.shape()[3],
    ];
    let values: Vec<f32> = input.iter().copied().collect();

    Tensor::from_data(TensorData::new(values, shape), device)
}
