//! ASCII PLY point-cloud writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExportError;

/// Fixed color palette for semantic and instance labels; labels wrap.
const PALETTE: [[u8; 3]; 16] = [
    [174, 199, 232],
    [152, 223, 138],
    [31, 119, 180],
    [255, 187, 120],
    [188, 189, 34],
    [140, 86, 75],
    [255, 152, 150],
    [214, 39, 40],
    [197, 176, 213],
    [148, 103, 189],
    [196, 156, 148],
    [23, 190, 207],
    [247, 182, 210],
    [219, 219, 141],
    [255, 127, 14],
    [158, 218, 229],
];

/// Default color when no labels accompany a semantic cloud.
const UNLABELED: [u8; 3] = [190, 190, 190];

pub fn label_color(label: u32) -> [u8; 3] {
    PALETTE[label as usize % PALETTE.len()]
}

/// Writes an unstructured point cloud, optionally with per-vertex colors.
pub fn write_pointcloud(
    points: &[[f32; 3]],
    colors: Option<&[[u8; 3]]>,
    path: &Path,
) -> Result<(), ExportError> {
    if let Some(colors) = colors {
        assert_eq!(points.len(), colors.len(), "one color per point");
    }

    let file = File::create(path).map_err(|source| ExportError::io(path, source))?;
    let mut writer = BufWriter::new(file);

    write_inner(&mut writer, points, colors).map_err(|source| ExportError::io(path, source))
}

/// Writes a point cloud colored by semantic labels (palette colors; a fixed
/// gray when no labels are given).
pub fn write_semantic_pointcloud(
    points: &[[f32; 3]],
    labels: Option<&[u32]>,
    path: &Path,
) -> Result<(), ExportError> {
    let colors: Vec<[u8; 3]> = match labels {
        Some(labels) => {
            assert_eq!(points.len(), labels.len(), "one label per point");
            labels.iter().map(|&label| label_color(label)).collect()
        }
        None => vec![UNLABELED; points.len()],
    };
    write_pointcloud(points, Some(&colors), path)
}

fn write_inner(
    writer: &mut impl Write,
    points: &[[f32; 3]],
    colors: Option<&[[u8; 3]]>,
) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    if colors.is_some() {
        writeln!(writer, "property uchar red")?;
        writeln!(writer, "property uchar green")?;
        writeln!(writer, "property uchar blue")?;
    }
    writeln!(writer, "end_header")?;

    match colors {
        Some(colors) => {
            for (point, color) in points.iter().zip(colors) {
                writeln!(
                    writer,
                    "{} {} {} {} {} {}",
                    point[0], point[1], point[2], color[0], color[1], color[2]
                )?;
            }
        }
        None => {
            for point in points {
                writeln!(writer, "{} {} {}", point[0], point[1], point[2])?;
            }
        }
    }
    writer.flush()
}
