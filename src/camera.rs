//! Camera intrinsics and depth-map geometry.

use std::path::Path;

use burn::prelude::*;

use crate::error::ExportError;
use crate::visualize::write_pointcloud;

/// Resolution of the color input image `(width, height)`.
pub const COLOR_IMAGE_SIZE: (u32, u32) = (320, 240);
/// Resolution of the predicted depth map `(width, height)`.
pub const DEPTH_IMAGE_SIZE: (u32, u32) = (160, 120);

/// Rescales a 3x3 pinhole intrinsic matrix from one image resolution to
/// another by proportionally scaling focal lengths and the principal point.
pub fn adjust_intrinsic(
    mut intrinsic: [[f32; 3]; 3],
    from: (u32, u32),
    to: (u32, u32),
) -> [[f32; 3]; 3] {
    let scale_x = to.0 as f32 / from.0 as f32;
    let scale_y = to.1 as f32 / from.1 as f32;

    intrinsic[0][0] *= scale_x;
    intrinsic[0][2] *= scale_x;
    intrinsic[1][1] *= scale_y;
    intrinsic[1][2] *= scale_y;
    intrinsic
}

pub fn intrinsic_to_tensor<B: Backend>(
    intrinsic: [[f32; 3]; 3],
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = intrinsic.iter().flatten().copied().collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([3, 3])
}

pub fn intrinsic_from_tensor<B: Backend>(intrinsic: &Tensor<B, 2>) -> [[f32; 3]; 3] {
    let values = intrinsic
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("intrinsic tensor conversion");

    let mut matrix = [[0.0f32; 3]; 3];
    for row in 0..3 {
        for col in 0..3 {
            matrix[row][col] = values[row * 3 + col];
        }
    }
    matrix
}

/// A predicted depth image bound to the intrinsic matrix it was predicted
/// under.
#[derive(Debug, Clone)]
pub struct DepthMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
    intrinsic: [[f32; 3]; 3],
}

impl DepthMap {
    /// Wraps a `[1, 1, H, W]` depth tensor.
    pub fn from_tensor<B: Backend>(depth: Tensor<B, 4>, intrinsic: [[f32; 3]; 3]) -> Self {
        let [_, _, height, width] = depth.shape().dims::<4>();
        let values = depth
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("depth tensor conversion");

        Self {
            width,
            height,
            values,
            intrinsic,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Unprojects every valid depth pixel through the pinhole intrinsic into
    /// a camera-space point.
    pub fn unproject(&self) -> Vec<[f32; 3]> {
        let fx = self.intrinsic[0][0];
        let fy = self.intrinsic[1][1];
        let cx = self.intrinsic[0][2];
        let cy = self.intrinsic[1][2];

        let mut points = Vec::with_capacity(self.values.len());
        for v in 0..self.height {
            for u in 0..self.width {
                let depth = self.values[v * self.width + u];
                if depth > 0.0 && depth.is_finite() {
                    let x = (u as f32 - cx) * depth / fx;
                    let y = (v as f32 - cy) * depth / fy;
                    points.push([x, y, depth]);
                }
            }
        }
        points
    }

    /// Writes the unprojected depth as an unstructured point cloud.
    pub fn to_pointcloud(&self, path: &Path) -> Result<(), ExportError> {
        write_pointcloud(&self.unproject(), None, path)
    }
}
