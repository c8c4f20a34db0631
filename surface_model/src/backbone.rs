use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        GroupNorm, GroupNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

const MAX_GROUPS: usize = 32;
const STAGES: usize = 4;

/// Residual feature extractor in the ResNet-18 layout.
#[derive(Config, Debug)]
pub struct BackboneConfig {
    /// Channels of the first stage; each later stage doubles it.
    #[config(default = 64)]
    pub base_width: usize,
    #[config(default = 2)]
    pub blocks_per_stage: usize,
}

impl BackboneConfig {
    pub fn num_features(&self) -> usize {
        self.base_width << (STAGES - 1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let mut blocks = Vec::with_capacity(STAGES * self.blocks_per_stage);
        let mut channels = self.base_width;

        for stage in 0..STAGES {
            let width = self.base_width << stage;
            for block in 0..self.blocks_per_stage {
                let stride = if stage > 0 && block == 0 { 2 } else { 1 };
                blocks.push(BasicBlock::new(channels, width, stride, device));
                channels = width;
            }
        }

        Backbone {
            stem: Conv2dConfig::new([3, self.base_width], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false)
                .init(device),
            stem_norm: group_norm(self.base_width, device),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            blocks,
            avg_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            activation: Relu::new(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    stem: Conv2d<B>,
    stem_norm: GroupNorm<B>,
    pool: MaxPool2d,
    blocks: Vec<BasicBlock<B>>,
    avg_pool: AdaptiveAvgPool2d,
    activation: Relu,
}

impl<B: Backend> Backbone<B> {
    /// `[batch, 3, H, W]` -> `[batch, num_features]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward(images);
        let x = self.stem_norm.forward(x);
        let x = self.activation.forward(x);
        let mut x = self.pool.forward(x);

        for block in &self.blocks {
            x = block.forward(x);
        }

        self.avg_pool.forward(x).flatten(1, 3)
    }
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: GroupNorm<B>,
    conv2: Conv2d<B>,
    norm2: GroupNorm<B>,
    downsample: Option<Downsample<B>>,
    activation: Relu,
}

#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    norm: GroupNorm<B>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_channels: usize, out_channels: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = (stride != 1 || in_channels != out_channels).then(|| Downsample {
            conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            norm: group_norm(out_channels, device),
        });

        Self {
            conv1: conv3x3(in_channels, out_channels, stride, device),
            norm1: group_norm(out_channels, device),
            conv2: conv3x3(out_channels, out_channels, 1, device),
            norm2: group_norm(out_channels, device),
            downsample,
            activation: Relu::new(),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.norm.forward(downsample.conv.forward(input.clone())),
            None => input.clone(),
        };

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);

        self.activation.forward(x + identity)
    }
}

fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

fn group_norm<B: Backend>(channels: usize, device: &B::Device) -> GroupNorm<B> {
    GroupNormConfig::new(gcd(MAX_GROUPS, channels), channels).init(device)
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;

    #[test]
    fn test_num_features() {
        assert_eq!(BackboneConfig::new().num_features(), 512);
        assert_eq!(BackboneConfig::new().with_base_width(8).num_features(), 64);
    }

    #[test]
    fn test_group_count_divides_channels() {
        assert_eq!(gcd(MAX_GROUPS, 64), 32);
        assert_eq!(gcd(MAX_GROUPS, 8), 8);
        assert_eq!(gcd(MAX_GROUPS, 48), 16);
    }

    #[test]
    fn test_forward_features() {
        let device = Default::default();
        let backbone = BackboneConfig::new()
            .with_base_width(4)
            .with_blocks_per_stage(1)
            .init::<B>(&device);

        let features = backbone.forward(Tensor::zeros([2, 3, 64, 64], &device));

        assert_eq!(features.dims(), [2, 32]);
    }
}
