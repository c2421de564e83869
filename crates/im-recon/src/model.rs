use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Device, Module};
use burn::Tensor;
use burn::tensor::activation::relu;

/// RGB + flattened input camera
pub const VIEW_CHANNELS: usize = 3 + 16;

/// Hyper-parameters of the triplane reconstructor
#[derive(Clone, Debug)]
pub struct TriplaneConfig {
    /// Feature channels per plane
    pub feature_channels: usize,
    /// Edge length of each plane
    pub plane_resolution: usize,
    /// Encoder hidden width
    pub hidden_channels: usize,
    /// Decoder hidden width
    pub decoder_hidden: usize,
    /// Samples along each camera ray
    pub samples_per_ray: usize,
    /// Voxel grid edge used for mesh extraction
    pub mesh_resolution: usize,
    /// Density above which a voxel is solid
    pub density_threshold: f32,
    /// Texture atlas tile edge, in texels
    pub texture_tile: u32,
    /// FOV used for cameras without intrinsics (degrees)
    pub fovy: f32,
    /// Render path: implicit-surface cameras (world-to-camera) or standard
    pub implicit_surface: bool,
}

impl Default for TriplaneConfig {
    fn default() -> Self {
        Self {
            feature_channels: 16,
            plane_resolution: 64,
            hidden_channels: 64,
            decoder_hidden: 32,
            samples_per_ray: 64,
            mesh_resolution: 96,
            density_threshold: 5.0,
            texture_tile: 4,
            fovy: 30.0,
            implicit_surface: true,
        }
    }
}

/// Multi-view images to triplanes, plus the point decoder
#[derive(Module, Debug)]
pub struct TriplaneModel<B: Backend> {
    // Encoder
    conv_in: Conv2d<B>,
    conv_out: Conv2d<B>,

    // Decoder: summed plane features -> (density, r, g, b)
    decoder_hidden: Linear<B>,
    decoder_out: Linear<B>,
}

impl<B: Backend> TriplaneModel<B> {
    pub fn new(config: &TriplaneConfig, device: &Device<B>) -> Self {
        Self {
            conv_in: Conv2dConfig::new([VIEW_CHANNELS, config.hidden_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            conv_out: Conv2dConfig::new([config.hidden_channels, 3 * config.feature_channels], [1, 1])
                .init(device),
            decoder_hidden: LinearConfig::new(config.feature_channels, config.decoder_hidden).init(device),
            decoder_out: LinearConfig::new(config.decoder_hidden, 4).init(device),
        }
    }

    /// Forward pass: [V, 19, R, R] -> [3 * C, R, R] flattened
    pub fn encode(&self, views: Tensor<B, 4>) -> Vec<f32> {
        let [_views, _channels, h, w] = views.dims();

        let x = self.conv_in.forward(views);
        let x = relu(x);
        let x = self.conv_out.forward(x);

        // Fuse views by averaging, keep features bounded
        let x = x.mean_dim(0).tanh();
        let [_, channels, _, _] = x.dims();
        let x = x.reshape([channels, h * w]);

        x.into_data().iter::<f32>().collect()
    }

    /// Decode `n` feature vectors into (density, r, g, b)
    pub fn decode(&self, features: &[f32], n: usize, device: &Device<B>) -> Vec<[f32; 4]> {
        if n == 0 {
            return Vec::new();
        }
        let channels = features.len() / n;

        let x: Tensor<B, 2> = Tensor::<B, 1>::from_floats(features, device).reshape([n, channels]);
        let x = relu(self.decoder_hidden.forward(x));
        let x = self.decoder_out.forward(x);

        let raw: Vec<f32> = x.into_data().iter::<f32>().collect();
        raw.chunks_exact(4)
            .map(|r| {
                // Density: softplus; color: sigmoid
                let sigma = if r[0] > 20.0 { r[0] } else { r[0].exp().ln_1p() };
                [
                    sigma,
                    1.0 / (1.0 + (-r[1]).exp()),
                    1.0 / (1.0 + (-r[2]).exp()),
                    1.0 / (1.0 + (-r[3]).exp()),
                ]
            })
            .collect()
    }
}
