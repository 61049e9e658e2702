//! Network heads of the shipped reconstruction model.

use burn::{
    module::Module,
    nn::PaddingConfig2d,
    nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::{relu, tanh},
};

/// Strided convolutional encoder over the normalized input image.
///
/// Produces features at half resolution (the depth resolution) and quarter
/// resolution for the prediction heads.
#[derive(Module, Debug)]
pub struct ImageEncoder<B: Backend> {
    conv_in: Conv2d<B>,
    conv_mid: Conv2d<B>,
    conv_down: Conv2d<B>,
}

impl<B: Backend> ImageEncoder<B> {
    pub fn new(device: &B::Device, channels: usize) -> Self {
        let conv_in = Conv2dConfig::new([3, channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv_mid = Conv2dConfig::new([channels, channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv_down = Conv2dConfig::new([channels, channels * 2], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        Self {
            conv_in,
            conv_mid,
            conv_down,
        }
    }

    /// Returns `(half, quarter)` resolution feature maps.
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let half = relu(self.conv_in.forward(x));
        let half = relu(self.conv_mid.forward(half));
        let quarter = relu(self.conv_down.forward(half.clone()));
        (half, quarter)
    }
}

/// Depth prediction head: quarter-resolution features up to a single-channel
/// depth map at half resolution.
#[derive(Module, Debug)]
pub struct DepthHead<B: Backend> {
    conv0: Conv2d<B>,
    deconv: ConvTranspose2d<B>,
    conv1: Conv2d<B>,
    conv_out: Conv2d<B>,
}

impl<B: Backend> DepthHead<B> {
    pub fn new(device: &B::Device, dim: usize) -> Self {
        let conv0 = Conv2dConfig::new([dim, dim / 2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let deconv = ConvTranspose2dConfig::new([dim / 2, dim / 2], [2, 2])
            .with_stride([2, 2])
            .with_bias(true)
            .init(device);
        let conv1 = Conv2dConfig::new([dim / 2, 32], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv_out = Conv2dConfig::new([32, 1], [1, 1]).with_bias(true).init(device);

        Self {
            conv0,
            deconv,
            conv1,
            conv_out,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv0.forward(x);
        let x = self.deconv.forward(x);
        let x = relu(self.conv1.forward(x));
        // depth is non-negative
        relu(self.conv_out.forward(x))
    }
}

/// Per-pixel semantic classification head at half resolution.
#[derive(Module, Debug)]
pub struct SemanticHead<B: Backend> {
    conv0: Conv2d<B>,
    deconv: ConvTranspose2d<B>,
    conv_out: Conv2d<B>,
}

impl<B: Backend> SemanticHead<B> {
    pub fn new(device: &B::Device, dim: usize, num_classes: usize) -> Self {
        let conv0 = Conv2dConfig::new([dim, dim / 2], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let deconv = ConvTranspose2dConfig::new([dim / 2, dim / 2], [2, 2])
            .with_stride([2, 2])
            .with_bias(true)
            .init(device);
        let conv_out = Conv2dConfig::new([dim / 2, num_classes], [1, 1])
            .with_bias(true)
            .init(device);

        Self {
            conv0,
            deconv,
            conv_out,
        }
    }

    /// Class logits, `[1, num_classes, H, W]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv0.forward(x));
        let x = relu(self.deconv.forward(x));
        self.conv_out.forward(x)
    }
}

/// Refinement head mapping per-voxel image features to truncated signed
/// distances in `[-1, 1]` (scaled by the truncation band by the caller).
#[derive(Module, Debug)]
pub struct TsdfHead<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl<B: Backend> TsdfHead<B> {
    pub fn new(device: &B::Device, dim: usize) -> Self {
        Self {
            fc1: LinearConfig::new(dim, dim / 2).with_bias(true).init(device),
            fc2: LinearConfig::new(dim / 2, 1).with_bias(true).init(device),
        }
    }

    /// `[N, dim]` gathered features to `[N, 1]` normalized distances.
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        tanh(self.fc2.forward(relu(self.fc1.forward(features))))
    }
}
