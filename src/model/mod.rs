//! Reconstruction model seam.
//!
//! The learned model is an external capability with a fixed calling
//! convention; everything the pipeline needs from it is captured by
//! [`SceneReconstruction`] and the [`ReconstructionResults`] schema. The
//! shipped implementor lives in [`panoptic`].

use std::path::Path;

use burn::prelude::*;

use crate::error::AssetError;
use crate::sparse::SparseVolume;

pub mod panoptic;

pub use panoptic::{PanopticNet, PanopticNetConfig};

/// A 2D object detection in color-image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Box corners `[x_min, y_min, x_max, y_max]`.
    pub bbox: [f32; 4],
    /// Semantic class id.
    pub label: u32,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

/// Sparse geometry predicted inside the visible frustum.
#[derive(Debug, Clone, Default)]
pub struct FrustumOutput {
    /// Truncated signed-distance values at active voxels.
    pub geometry: SparseVolume,
}

/// Combined semantic and instance labeling of the reconstructed volume.
#[derive(Debug, Clone, Default)]
pub struct PanopticOutput {
    /// Per-voxel semantic class ids.
    pub semantics: SparseVolume,
    /// Per-voxel instance ids; 0 marks unassigned voxels.
    pub instances: SparseVolume,
}

/// Everything a single forward pass produces. Built once per run and
/// consumed read-only by the exporter.
#[derive(Debug, Clone)]
pub struct ReconstructionResults<B: Backend> {
    /// The normalized `[1, 3, H, W]` input the model saw.
    pub input: Tensor<B, 4>,
    /// Predicted depth, `[1, 1, H/2, W/2]`.
    pub depth: Tensor<B, 4>,
    /// Intrinsic matrix at depth resolution, `[3, 3]`.
    pub intrinsic: Tensor<B, 2>,
    /// 2D detections over the input image.
    pub detections: Vec<Detection>,
    /// Voxel coordinates the depth map projects into.
    pub projection: SparseVolume,
    pub frustum: FrustumOutput,
    pub panoptic: PanopticOutput,
}

/// Calling convention of the reconstruction model.
///
/// Implementors restore their parameters from a checkpoint and run a single
/// evaluation-mode forward pass; inference backends carry no gradient
/// tracking. Input shapes, dtypes, and devices are fixed: a normalized
/// `[1, 3, 240, 320]` image, a `[3, 3]` intrinsic at depth resolution, and a
/// `[1, 1, X, Y, Z]` boolean frustum mask, all on the model's device.
pub trait SceneReconstruction<B: Backend>: Sized {
    /// Restores model parameters from `checkpoint` onto `device`.
    fn load(device: &B::Device, checkpoint: &Path) -> Result<Self, AssetError>;

    /// Runs the forward pass, producing the full results bundle.
    fn inference(
        &self,
        input: Tensor<B, 4>,
        intrinsic: Tensor<B, 2>,
        frustum_mask: Tensor<B, 5, Bool>,
    ) -> ReconstructionResults<B>;
}
