//! Result export.
//!
//! A fixed sequence of writes under the output directory. Each write failure
//! carries the path of the file being written; files from earlier stages stay
//! on disk.

use std::fs;

use burn::prelude::*;
use tracing::info;

use crate::camera::{DepthMap, intrinsic_from_tensor};
use crate::config::Config;
use crate::error::ExportError;
use crate::model::ReconstructionResults;
use crate::visualize::{
    VolumeGrid, write_depth, write_detection_image, write_distance_field, write_pointcloud,
    write_semantic_pointcloud,
};

/// Exports the full results bundle, creating the output directory (and
/// parents) first.
pub fn export_results<B: Backend>(
    results: &ReconstructionResults<B>,
    config: &Config,
) -> Result<(), ExportError> {
    let output = config.output_dir.as_path();
    fs::create_dir_all(output).map_err(|source| ExportError::io(output, source))?;
    info!(output = %output.display(), "visualize results");

    // Depth prediction, as a point cloud and a rendered image.
    let depth_map = DepthMap::from_tensor(
        results.depth.clone(),
        intrinsic_from_tensor(&results.intrinsic),
    );
    depth_map.to_pointcloud(&output.join("depth_prediction.ply"))?;
    write_depth(&depth_map, &output.join("depth_map.png"))?;

    // 2D detections over the input image.
    write_detection_image(&results.input, &results.detections, &output.join("detection.png"))?;

    // Projection coordinates, batch column dropped.
    write_pointcloud(
        &results.projection.spatial_points(),
        None,
        &output.join("projection.ply"),
    )?;

    // Dense 3D outputs.
    let device = results.depth.device();
    let frustum = &config.model.frustum3d;
    let [dim_x, dim_y, dim_z] = frustum.grid_dimensions;
    let dimensions = [1, 1, dim_x, dim_y, dim_z];
    let min_coordinates = [0, 0, 0];

    let geometry = &results.frustum.geometry;
    let surface = geometry.dense::<B>(dimensions, min_coordinates, frustum.truncation, &device);
    let semantics =
        results
            .panoptic
            .semantics
            .dense::<B>(dimensions, min_coordinates, 0.0, &device);
    let instances =
        results
            .panoptic
            .instances
            .dense::<B>(dimensions, min_coordinates, 0.0, &device);

    write_pointcloud(
        &geometry.spatial_points(),
        None,
        &output.join("sparse_coordinates.ply"),
    )?;

    let field = VolumeGrid::from_tensor(surface);
    let points = field.cells_below(frustum.iso_value);
    write_pointcloud(&points, None, &output.join("points_geometry.ply"))?;
    // the semantic cloud goes to surface_pcd.ply twice; the second write wins
    write_semantic_pointcloud(&points, None, &output.join("surface_pcd.ply"))?;
    write_semantic_pointcloud(&points, None, &output.join("surface_pcd.ply"))?;

    let semantic_grid = VolumeGrid::from_tensor(semantics);
    let instance_grid = VolumeGrid::from_tensor(instances);
    write_distance_field(&field, None, frustum.iso_value, &output.join("mesh_geometry.ply"))?;
    write_distance_field(
        &field,
        Some(&semantic_grid),
        frustum.iso_value,
        &output.join("mesh_semantics.ply"),
    )?;
    write_distance_field(
        &field,
        Some(&instance_grid),
        frustum.iso_value,
        &output.join("mesh_instances.ply"),
    )?;

    Ok(())
}
