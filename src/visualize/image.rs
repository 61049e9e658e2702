//! Image renderings of the prediction results.

use std::path::Path;

use burn::prelude::*;
use image::GrayImage;

use crate::camera::DepthMap;
use crate::error::ExportError;
use crate::model::Detection;
use crate::preprocess::tensor_to_image;
use crate::visualize::ply::label_color;

/// Renders the depth map as a min/max-normalized grayscale PNG.
pub fn write_depth(depth_map: &DepthMap, path: &Path) -> Result<(), ExportError> {
    let values = depth_map.values();

    let (mut min_depth, mut max_depth) = (f32::INFINITY, f32::NEG_INFINITY);
    for &value in values {
        if value.is_finite() {
            min_depth = min_depth.min(value);
            max_depth = max_depth.max(value);
        }
    }
    if !min_depth.is_finite() || !max_depth.is_finite() {
        min_depth = 0.0;
        max_depth = 1.0;
    }
    let range = (max_depth - min_depth).max(f32::EPSILON);

    let pixels: Vec<u8> = values
        .iter()
        .map(|&value| {
            let normalized = if value.is_finite() {
                ((value - min_depth) / range).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (normalized * 255.0).round().clamp(0.0, 255.0) as u8
        })
        .collect();

    let image = GrayImage::from_vec(depth_map.width() as u32, depth_map.height() as u32, pixels)
        .expect("depth buffer matches its dimensions");
    image.save(path).map_err(|source| ExportError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

/// Draws detection boxes over the de-normalized input image.
pub fn write_detection_image<B: Backend>(
    input: &Tensor<B, 4>,
    detections: &[Detection],
    path: &Path,
) -> Result<(), ExportError> {
    let mut image = tensor_to_image(input);

    for detection in detections {
        draw_box_outline(&mut image, detection.bbox, label_color(detection.label));
    }

    image.save(path).map_err(|source| ExportError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

fn draw_box_outline(image: &mut image::RgbImage, bbox: [f32; 4], color: [u8; 3]) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let x0 = (bbox[0].max(0.0) as u32).min(width - 1);
    let y0 = (bbox[1].max(0.0) as u32).min(height - 1);
    let x1 = (bbox[2].max(0.0) as u32).min(width - 1);
    let y1 = (bbox[3].max(0.0) as u32).min(height - 1);

    for x in x0..=x1 {
        image.put_pixel(x, y0, image::Rgb(color));
        image.put_pixel(x, y1, image::Rgb(color));
    }
    for y in y0..=y1 {
        image.put_pixel(x0, y, image::Rgb(color));
        image.put_pixel(x1, y, image::Rgb(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn depth_render_spans_the_full_gray_range() {
        let device = <TestBackend as Backend>::Device::default();
        let depth = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device)
            .reshape([1, 1, 2, 2]);
        let map = DepthMap::from_tensor(
            depth,
            [[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth_map.png");
        write_depth(&map, &path).unwrap();

        let rendered = image::open(&path).unwrap().to_luma8();
        assert_eq!(rendered.dimensions(), (2, 2));
        assert_eq!(rendered.get_pixel(0, 0).0[0], 0);
        assert_eq!(rendered.get_pixel(1, 1).0[0], 255);
    }

    #[test]
    fn detection_overlay_marks_the_box_border() {
        let device = <TestBackend as Backend>::Device::default();
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let detections = vec![Detection {
            bbox: [1.0, 1.0, 5.0, 5.0],
            label: 2,
            score: 0.9,
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detection.png");
        write_detection_image(&input, &detections, &path).unwrap();

        let rendered = image::open(&path).unwrap().to_rgb8();
        let color = label_color(2);
        assert_eq!(rendered.get_pixel(1, 1).0, color);
        assert_eq!(rendered.get_pixel(5, 3).0, color);
        assert_ne!(rendered.get_pixel(3, 3).0, color);
    }
}
