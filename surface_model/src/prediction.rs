use burn::tensor::{activation::softmax, backend::Backend};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::classifier::DualLogits;
use crate::labels::{Finish, Material};

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("failed to read probabilities: {0}")]
    TensorData(String),
    #[error("{head} head returned {got} classes, expected {expected}")]
    HeadSize {
        head: &'static str,
        got: usize,
        expected: usize,
    },
}

/// Classification of one image: the winning label of each head and its
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub material: Material,
    pub finish: Finish,
    pub material_confidence: f32,
    pub finish_confidence: f32,
}

impl Prediction {
    pub fn new(
        material: Material,
        material_confidence: f32,
        finish: Finish,
        finish_confidence: f32,
    ) -> Self {
        Self {
            material,
            finish,
            material_confidence,
            finish_confidence,
        }
    }

    /// Winning confidences keyed by label name. When both heads pick
    /// `Other` the finish confidence is the one kept under that key.
    pub fn scores(&self) -> BTreeMap<&'static str, f32> {
        BTreeMap::from([
            (self.material.as_str(), self.material_confidence),
            (self.finish.as_str(), self.finish_confidence),
        ])
    }

    /// Applies softmax per head and takes the argmax of the first row.
    pub fn from_logits<B: Backend>(logits: DualLogits<B>) -> Result<Self, PredictionError> {
        let material_probs = probabilities(logits.material)?;
        let finish_probs = probabilities(logits.finish)?;

        Self::from_probabilities(&material_probs, &finish_probs)
    }

    pub fn from_probabilities(
        material_probs: &[f32],
        finish_probs: &[f32],
    ) -> Result<Self, PredictionError> {
        check_size("material", material_probs.len(), Material::COUNT)?;
        check_size("finish", finish_probs.len(), Finish::COUNT)?;

        let (material_idx, material_confidence) = argmax(material_probs);
        let (finish_idx, finish_confidence) = argmax(finish_probs);

        // Sizes were checked above, so both indices are in range.
        let material = Material::from_index(material_idx).unwrap_or(Material::Other);
        let finish = Finish::from_index(finish_idx).unwrap_or(Finish::Other);

        Ok(Self::new(
            material,
            material_confidence,
            finish,
            finish_confidence,
        ))
    }
}

fn probabilities<B: Backend>(
    logits: burn::tensor::Tensor<B, 2>,
) -> Result<Vec<f32>, PredictionError> {
    let [_, num_classes] = logits.dims();
    let probs = softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PredictionError::TensorData(format!("{:?}", e)))?;

    Ok(probs.into_iter().take(num_classes).collect())
}

fn check_size(head: &'static str, got: usize, expected: usize) -> Result<(), PredictionError> {
    if got != expected {
        return Err(PredictionError::HeadSize {
            head,
            got,
            expected,
        });
    }
    Ok(())
}

fn argmax(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
        .unwrap_or((0, 0.0))
}
