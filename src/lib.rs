//! Single-image panoptic 3D scene reconstruction.
//!
//! Given one RGB image, a trained model predicts a truncated signed-distance
//! volume, per-voxel semantic and instance labels, depth, and 2D detections;
//! the exporter materializes the sparse volumes and writes point clouds,
//! meshes, and rendered images. The model itself sits behind the
//! [`model::SceneReconstruction`] seam; this crate orchestrates one offline
//! inference per process run.

#![recursion_limit = "256"]

pub mod camera;
pub mod config;
pub mod error;
pub mod export;
pub mod frustum;
pub mod inference;
pub mod loss;
pub mod model;
pub mod preprocess;
pub mod sparse;
pub mod visualize;
