//! Dual-head surface classifier.
//!
//! A shared residual backbone feeds two independent heads, one scoring the
//! material and one scoring the finish of the photographed surface.

use burn::{
    config::Config,
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::backbone::{Backbone, BackboneConfig};
use crate::labels::{Finish, Material};

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub backbone: BackboneConfig,
    #[config(default = 6)]
    pub num_materials: usize,
    #[config(default = 7)]
    pub num_finishes: usize,
    #[config(default = 512)]
    pub hidden_size: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new(BackboneConfig::new())
            .with_num_materials(Material::COUNT)
            .with_num_finishes(Finish::COUNT)
    }
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SurfaceClassifier<B> {
        let num_features = self.backbone.num_features();

        SurfaceClassifier {
            backbone: self.backbone.init(device),
            material_head: self.head(num_features, self.num_materials, device),
            finish_head: self.head(num_features, self.num_finishes, device),
        }
    }

    fn head<B: Backend>(
        &self,
        num_features: usize,
        num_classes: usize,
        device: &B::Device,
    ) -> ClassificationHead<B> {
        ClassificationHead {
            hidden: LinearConfig::new(num_features, self.hidden_size).init(device),
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, num_classes).init(device),
        }
    }
}

/// `Linear -> ReLU -> Dropout -> Linear`
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    pub hidden: Linear<B>,
    activation: Relu,
    dropout: Dropout,
    pub output: Linear<B>,
}

impl<B: Backend> ClassificationHead<B> {
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(features);
        let x = self.activation.forward(x);
        let x = self.dropout.forward(x);
        self.output.forward(x)
    }

    pub fn num_classes(&self) -> usize {
        self.output.weight.val().dims()[1]
    }
}

#[derive(Module, Debug)]
pub struct SurfaceClassifier<B: Backend> {
    pub backbone: Backbone<B>,
    pub material_head: ClassificationHead<B>,
    pub finish_head: ClassificationHead<B>,
}

/// Raw scores of both heads, `[batch, classes]` each.
#[derive(Debug, Clone)]
pub struct DualLogits<B: Backend> {
    pub material: Tensor<B, 2>,
    pub finish: Tensor<B, 2>,
}

impl<B: Backend> SurfaceClassifier<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> DualLogits<B> {
        let features = self.backbone.forward(images);

        DualLogits {
            material: self.material_head.forward(features.clone()),
            finish: self.finish_head.forward(features),
        }
    }

    /// Unweighted sum of the material and finish cross-entropy losses.
    pub fn forward_loss(
        &self,
        images: Tensor<B, 4>,
        material_targets: Tensor<B, 1, Int>,
        finish_targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        let logits = self.forward(images);
        let criterion = CrossEntropyLossConfig::new().init(&logits.material.device());

        let material_loss = criterion.forward(logits.material, material_targets);
        let finish_loss = criterion.forward(logits.finish, finish_targets);

        material_loss + finish_loss
    }

    /// Output sizes of the material and finish heads.
    pub fn head_sizes(&self) -> (usize, usize) {
        (
            self.material_head.num_classes(),
            self.finish_head.num_classes(),
        )
    }
}
