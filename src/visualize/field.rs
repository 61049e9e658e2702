//! Dense distance-field export.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use burn::prelude::*;

use crate::error::ExportError;
use crate::visualize::ply::label_color;

/// A dense scalar volume on the host, row-major over `[X, Y, Z]`.
#[derive(Debug, Clone)]
pub struct VolumeGrid {
    dims: [usize; 3],
    values: Vec<f32>,
}

impl VolumeGrid {
    /// Reads back a `[1, 1, X, Y, Z]` tensor.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 5>) -> Self {
        let [_, _, dim_x, dim_y, dim_z] = tensor.shape().dims::<5>();
        let values = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("dense grid conversion");

        Self {
            dims: [dim_x, dim_y, dim_z],
            values,
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[(x * self.dims[1] + y) * self.dims[2] + z]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Grid coordinates of every voxel with a value strictly below `iso`.
    pub fn cells_below(&self, iso: f32) -> Vec<[f32; 3]> {
        let mut cells = Vec::new();
        for x in 0..self.dims[0] {
            for y in 0..self.dims[1] {
                for z in 0..self.dims[2] {
                    if self.value(x, y, z) < iso {
                        cells.push([x as f32, y as f32, z as f32]);
                    }
                }
            }
        }
        cells
    }
}

// Faces of a unit voxel at (x, y, z): per direction, the neighbor offset and
// the four corner offsets of the shared face.
const FACES: [([i64; 3], [[usize; 3]; 4]); 6] = [
    ([-1, 0, 0], [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
    ([1, 0, 0], [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
    ([0, -1, 0], [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
    ([0, 1, 0], [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
    ([0, 0, -1], [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
    ([0, 0, 1], [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
];

/// Writes the surface of the distance field as a voxel-face mesh: every
/// voxel under the iso value contributes the faces it exposes to voxels at
/// or above it. Vertices are colored by the label grid when one is given.
pub fn write_distance_field(
    field: &VolumeGrid,
    labels: Option<&VolumeGrid>,
    iso_value: f32,
    path: &Path,
) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::io(path, source))?;
    let mut writer = BufWriter::new(file);

    let mut vertices: Vec<([f32; 3], [u8; 3])> = Vec::new();
    let mut vertex_ids: HashMap<(usize, usize, usize), u32> = HashMap::new();
    let mut faces: Vec<[u32; 4]> = Vec::new();

    let [dim_x, dim_y, dim_z] = field.dims;
    for x in 0..dim_x {
        for y in 0..dim_y {
            for z in 0..dim_z {
                if field.value(x, y, z) >= iso_value {
                    continue;
                }
                let color = match labels {
                    Some(labels) => label_color(labels.value(x, y, z) as u32),
                    None => [190, 190, 190],
                };

                for (offset, corners) in &FACES {
                    let nx = x as i64 + offset[0];
                    let ny = y as i64 + offset[1];
                    let nz = z as i64 + offset[2];
                    let exposed = nx < 0
                        || ny < 0
                        || nz < 0
                        || nx as usize >= dim_x
                        || ny as usize >= dim_y
                        || nz as usize >= dim_z
                        || field.value(nx as usize, ny as usize, nz as usize) >= iso_value;
                    if !exposed {
                        continue;
                    }

                    let mut face = [0u32; 4];
                    for (slot, corner) in corners.iter().enumerate() {
                        let key = (x + corner[0], y + corner[1], z + corner[2]);
                        let id = *vertex_ids.entry(key).or_insert_with(|| {
                            vertices.push((
                                [key.0 as f32, key.1 as f32, key.2 as f32],
                                color,
                            ));
                            vertices.len() as u32 - 1
                        });
                        face[slot] = id;
                    }
                    faces.push(face);
                }
            }
        }
    }

    write_mesh(&mut writer, &vertices, &faces).map_err(|source| ExportError::io(path, source))
}

fn write_mesh(
    writer: &mut impl Write,
    vertices: &[([f32; 3], [u8; 3])],
    faces: &[[u32; 4]],
) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", vertices.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "element face {}", faces.len())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    for (position, color) in vertices {
        writeln!(
            writer,
            "{} {} {} {} {} {}",
            position[0], position[1], position[2], color[0], color[1], color[2]
        )?;
    }
    for face in faces {
        writeln!(writer, "4 {} {} {} {}", face[0], face[1], face[2], face[3])?;
    }
    writer.flush()
}
