//! Output writers for point clouds, distance fields, and images.

pub mod field;
pub mod image;
pub mod ply;

pub use field::{VolumeGrid, write_distance_field};
pub use image::{write_depth, write_detection_image};
pub use ply::{label_color, write_pointcloud, write_semantic_pointcloud};
