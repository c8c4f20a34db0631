//! Folder-labeled image dataset.
//!
//! Labeled images live under `<root>/train/<Material>_<Finish>/`. The labeling
//! tool writes into that layout and the trainer reads from it.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
use chrono::{DateTime, Local};
use image::ImageFormat;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::labels::{Finish, Material};
use crate::preprocess::{normalize_image, open_image};

const TRAIN_SPLIT: &str = "train";
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not a valid image file name")]
    InvalidFileName(String),
    #[error("{0} is not a readable png or jpeg image")]
    NotAnImage(String),
}

pub fn class_dir_name(material: Material, finish: Finish) -> String {
    format!("{}_{}", material, finish)
}

pub fn parse_class_dir(name: &str) -> Option<(Material, Finish)> {
    let (material, finish) = name.split_once('_')?;
    Some((material.parse().ok()?, finish.parse().ok()?))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn is_image(path: &Path) -> bool {
    path.is_file() && has_image_extension(path)
}

/// Accepts only png/jpg/jpeg names whose content decodes as PNG or JPEG.
pub fn check_image(file_name: &str, image_data: &[u8]) -> Result<(), DatasetError> {
    let not_an_image = || DatasetError::NotAnImage(file_name.to_string());
    if !has_image_extension(Path::new(file_name)) {
        return Err(not_an_image());
    }
    match image::guess_format(image_data) {
        Ok(ImageFormat::Png | ImageFormat::Jpeg) => {}
        _ => return Err(not_an_image()),
    }
    image::load_from_memory(image_data).map_err(|_| not_an_image())?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn train_dir(&self) -> PathBuf {
        self.root.join(TRAIN_SPLIT)
    }

    pub fn class_dir(&self, material: Material, finish: Finish) -> PathBuf {
        self.train_dir().join(class_dir_name(material, finish))
    }

    /// Stores one labeled image as `<timestamp>_<name><ext>` in its class
    /// folder and returns the written path. Uploads that fail
    /// [`check_image`] are not written.
    pub fn save_image(
        &self,
        material: Material,
        finish: Finish,
        original_name: &str,
        image_data: &[u8],
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf, DatasetError> {
        let file_name = Path::new(original_name)
            .file_name()
            .ok_or_else(|| DatasetError::InvalidFileName(original_name.to_string()))?;
        let file_name = Path::new(file_name);
        check_image(&file_name.to_string_lossy(), image_data)?;
        let stem = file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file_name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let save_dir = self.class_dir(material, finish);
        std::fs::create_dir_all(&save_dir)?;

        let prefix = format!("{}_{}", timestamp.format("%Y%m%d_%H%M%S"), stem);
        let mut save_path = save_dir.join(format!("{}{}", prefix, ext));
        let mut suffix = 1;
        while save_path.exists() {
            save_path = save_dir.join(format!("{}_{}{}", prefix, suffix, ext));
            suffix += 1;
        }

        std::fs::write(&save_path, image_data)?;
        tracing::debug!("Saved labeled image to {}", save_path.display());

        Ok(save_path)
    }

    /// Number of images per class folder. Folders whose names are not a
    /// known label pair are counted too.
    pub fn class_counts(&self) -> Result<BTreeMap<String, usize>, DatasetError> {
        let mut counts = BTreeMap::new();
        let train_dir = self.train_dir();
        if !train_dir.exists() {
            return Ok(counts);
        }

        for entry in std::fs::read_dir(&train_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let class_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut count = 0;
            for image in std::fs::read_dir(&path)? {
                if is_image(&image?.path()) {
                    count += 1;
                }
            }
            counts.insert(class_name, count);
        }

        Ok(counts)
    }
}

#[derive(Clone, Debug)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub material: Material,
    pub finish: Finish,
}

/// Image paths with their label pair.
pub struct LabeledDataset {
    samples: Vec<LabeledImage>,
    skipped: usize,
}

impl LabeledDataset {
    pub fn new(samples: Vec<LabeledImage>) -> Self {
        Self {
            samples,
            skipped: 0,
        }
    }

    /// Images left out of the dataset because they could not be decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Scans the class folders, decoding every image once so unreadable
    /// files are dropped here instead of reaching a batch.
    pub fn from_layout(layout: &DatasetLayout) -> Result<Self, DatasetError> {
        let mut samples = Vec::new();
        let mut skipped = 0;
        let train_dir = layout.train_dir();
        if !train_dir.exists() {
            return Ok(Self::new(samples));
        }

        let mut class_dirs: Vec<PathBuf> = std::fs::read_dir(&train_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        class_dirs.sort();

        for class_dir in class_dirs.into_iter().filter(|p| p.is_dir()) {
            let class_name = class_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some((material, finish)) = parse_class_dir(&class_name) else {
                tracing::warn!("Skipping unlabeled folder {}", class_dir.display());
                continue;
            };

            let mut images: Vec<PathBuf> = std::fs::read_dir(&class_dir)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<Result<_, _>>()?;
            images.sort();

            let before = samples.len();
            for path in images.into_iter().filter(|p| is_image(p)) {
                if let Err(e) = open_image(&path) {
                    tracing::warn!("Skipping unreadable image {}: {}", path.display(), e);
                    skipped += 1;
                    continue;
                }
                samples.push(LabeledImage {
                    path,
                    material,
                    finish,
                });
            }
            tracing::info!("Class {}: {} images", class_name, samples.len() - before);
        }

        Ok(Self { samples, skipped })
    }
}

impl Dataset<LabeledImage> for LabeledDataset {
    fn get(&self, index: usize) -> Option<LabeledImage> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Clone, Debug)]
pub struct SurfaceBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub materials: Tensor<B, 1, Int>,
    pub finishes: Tensor<B, 1, Int>,
}

#[derive(Clone)]
pub struct SurfaceBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
}

impl<B: Backend> SurfaceBatcher<B> {
    pub fn new(device: B::Device, image_size: usize) -> Self {
        Self { device, image_size }
    }
}

impl<B: Backend> Batcher<B, LabeledImage, SurfaceBatch<B>> for SurfaceBatcher<B> {
    /// Samples whose image can no longer be read are left out, so a batch
    /// can be smaller than requested, or empty.
    fn batch(&self, items: Vec<LabeledImage>, _device: &B::Device) -> SurfaceBatch<B> {
        let size = self.image_size;
        let mut pixels = Vec::with_capacity(items.len() * 3 * size * size);
        let mut materials = Vec::with_capacity(items.len());
        let mut finishes = Vec::with_capacity(items.len());

        for item in items {
            let image = match open_image(&item.path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!("Dropping {} from batch: {}", item.path.display(), e);
                    continue;
                }
            };
            pixels.extend(normalize_image(&image, size).iter().copied());
            materials.push(item.material.index() as i64);
            finishes.push(item.finish.index() as i64);
        }
        let batch_size = materials.len();

        let images = Tensor::from_data(
            TensorData::new(pixels, [batch_size, 3, size, size]),
            &self.device,
        );
        let materials = Tensor::from_data(TensorData::new(materials, [batch_size]), &self.device);
        let finishes = Tensor::from_data(TensorData::new(finishes, [batch_size]), &self.device);

        SurfaceBatch {
            images,
            materials,
            finishes,
        }
    }
}
