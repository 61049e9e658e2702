//! Shipped reconstruction model.
//!
//! A compact implementor of [`SceneReconstruction`]: a strided conv encoder
//! with depth and semantic heads, depth lifting into the frustum grid, and a
//! linear refinement head producing truncated signed distances at the lifted
//! voxels. It exercises the full calling convention (checkpoint restore,
//! device placement, output schema) without claiming the original network's
//! capacity.

use std::path::Path;

use burn::{
    module::{Ignored, Module},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder, RecorderError},
    tensor::activation::softmax,
};

use crate::camera::intrinsic_from_tensor;
use crate::error::AssetError;
use crate::frustum::mask_to_flags;
use crate::model::{
    FrustumOutput, PanopticOutput, ReconstructionResults, SceneReconstruction,
};
use crate::sparse::SparseVolume;

pub mod heads;
mod lift;

use heads::{DepthHead, ImageEncoder, SemanticHead, TsdfHead};

/// Components smaller than this many depth pixels never become detections.
const MIN_DETECTION_AREA: usize = 24;

#[derive(Config, Debug)]
pub struct PanopticNetConfig {
    #[config(default = "16")]
    pub base_channels: usize,

    #[config(default = "13")]
    pub num_classes: usize,

    /// Signed-distance truncation band in voxels.
    #[config(default = "3.0")]
    pub truncation: f32,

    /// Edge length of one voxel in metres.
    #[config(default = "0.03")]
    pub voxel_size: f32,
}

impl Default for PanopticNetConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Module, Debug)]
pub struct PanopticNet<B: Backend> {
    encoder: ImageEncoder<B>,
    depth_head: DepthHead<B>,
    semantic_head: SemanticHead<B>,
    tsdf_head: TsdfHead<B>,
    num_classes: Ignored<usize>,
    truncation: Ignored<f32>,
    voxel_size: Ignored<f32>,
}

/// Raw head outputs of one forward pass.
pub struct PanopticForward<B: Backend> {
    /// `[1, 1, H/2, W/2]` depth.
    pub depth: Tensor<B, 4>,
    /// `[1, num_classes, H/2, W/2]` class logits.
    pub semantic_logits: Tensor<B, 4>,
    /// `[1, C, H/2, W/2]` shared features for the refinement head.
    pub features: Tensor<B, 4>,
}

impl<B: Backend> PanopticNet<B> {
    pub fn new(device: &B::Device, config: PanopticNetConfig) -> Self {
        let channels = config.base_channels;
        Self {
            encoder: ImageEncoder::new(device, channels),
            depth_head: DepthHead::new(device, channels * 2),
            semantic_head: SemanticHead::new(device, channels * 2, config.num_classes),
            tsdf_head: TsdfHead::new(device, channels),
            num_classes: Ignored(config.num_classes),
            truncation: Ignored(config.truncation),
            voxel_size: Ignored(config.voxel_size),
        }
    }

    pub fn load_with_config(
        device: &B::Device,
        config: PanopticNetConfig,
        checkpoint_path: &Path,
    ) -> Result<Self, AssetError> {
        if !checkpoint_path.exists() {
            return Err(AssetError::CheckpointMissing(checkpoint_path.to_path_buf()));
        }
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        Self::new(device, config)
            .load_file(checkpoint_path, &recorder, device)
            .map_err(|source| AssetError::Checkpoint {
                path: checkpoint_path.to_path_buf(),
                source,
            })
    }

    /// Records the parameters as a named-mpk checkpoint.
    pub fn save(self, checkpoint_path: &Path) -> Result<(), RecorderError> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder.record(self.into_record(), checkpoint_path.to_path_buf())
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> PanopticForward<B> {
        let (half, quarter) = self.encoder.forward(input);
        let depth = self.depth_head.forward(quarter.clone());
        let semantic_logits = self.semantic_head.forward(quarter);

        PanopticForward {
            depth,
            semantic_logits,
            features: half,
        }
    }
}

impl<B: Backend> SceneReconstruction<B> for PanopticNet<B> {
    fn load(device: &B::Device, checkpoint: &Path) -> Result<Self, AssetError> {
        Self::load_with_config(device, PanopticNetConfig::default(), checkpoint)
    }

    fn inference(
        &self,
        input: Tensor<B, 4>,
        intrinsic: Tensor<B, 2>,
        frustum_mask: Tensor<B, 5, Bool>,
    ) -> ReconstructionResults<B> {
        let device = input.device();
        let outputs = self.forward(input.clone());

        let [_, _, height, width] = outputs.depth.shape().dims::<4>();
        let hw = height * width;
        let depth_values = outputs
            .depth
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("depth tensor conversion");

        let probabilities = softmax(outputs.semantic_logits, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("semantic tensor conversion");
        let (classes, scores) = lift::argmax_classes(&probabilities, self.num_classes.0, hw);

        // detections at color resolution, twice the depth resolution
        let detections =
            lift::detections_from_classes(&classes, &scores, width, height, 2.0, MIN_DETECTION_AREA);

        let [_, _, dim_x, dim_y, dim_z] = frustum_mask.shape().dims::<5>();
        let mask_flags = mask_to_flags(&frustum_mask);
        let lifted = lift::lift_depth(
            &depth_values,
            width,
            height,
            intrinsic_from_tensor(&intrinsic),
            self.voxel_size.0,
            [dim_x, dim_y, dim_z],
            &mask_flags,
        );

        let mut projection = SparseVolume::default();
        let mut semantics = SparseVolume::default();
        let mut instances = SparseVolume::default();
        for entry in &lifted {
            let class = classes[entry.pixel];
            let instance = lift::instance_id_for_pixel(
                &detections,
                entry.pixel % width,
                entry.pixel / width,
                class,
                2.0,
            );
            projection.push(entry.coordinate, 1.0);
            semantics.push(entry.coordinate, class as f32);
            instances.push(entry.coordinate, instance as f32);
        }

        let geometry = if lifted.is_empty() {
            SparseVolume::default()
        } else {
            let feature_values = outputs
                .features
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .expect("feature tensor conversion");
            let channels = feature_values.len() / hw;

            let mut gathered = Vec::with_capacity(lifted.len() * channels);
            for entry in &lifted {
                for channel in 0..channels {
                    gathered.push(feature_values[channel * hw + entry.pixel]);
                }
            }

            let distances = self
                .tsdf_head
                .forward(
                    Tensor::<B, 1>::from_floats(gathered.as_slice(), &device)
                        .reshape([lifted.len() as i32, channels as i32]),
                )
                .mul_scalar(self.truncation.0)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .expect("tsdf tensor conversion");

            let coordinates = lifted.iter().map(|entry| entry.coordinate).collect();
            SparseVolume::new(coordinates, distances)
        };

        ReconstructionResults {
            input,
            depth: outputs.depth,
            intrinsic,
            detections,
            projection,
            frustum: FrustumOutput { geometry },
            panoptic: PanopticOutput {
                semantics,
                instances,
            },
        }
    }
}
