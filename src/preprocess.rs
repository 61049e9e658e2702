//! Input image preparation.
//!
//! The transform pipeline is fixed: decode (PNG only), resize to the color
//! resolution, convert to a channel-first float tensor, normalize with the
//! ImageNet statistics, and add the leading batch dimension.

use std::path::Path;

use burn::prelude::*;
use image::{ImageFormat, ImageReader, RgbImage, imageops};

use crate::camera::COLOR_IMAGE_SIZE;
use crate::error::ImageDecodeError;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decodes the input image, requiring PNG content.
pub fn load_png(path: &Path) -> Result<RgbImage, ImageDecodeError> {
    let reader = ImageReader::open(path)
        .map_err(|source| ImageDecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| ImageDecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    if reader.format() != Some(ImageFormat::Png) {
        return Err(ImageDecodeError::Format {
            path: path.to_path_buf(),
        });
    }

    let image = reader.decode().map_err(|source| ImageDecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

/// Converts packed RGB pixels into a normalized `[1, 3, H, W]` tensor.
pub fn image_to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = image.dimensions();
    let hw = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * hw];

    for (idx, pixel) in image.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            data[channel * hw + idx] = (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }

    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([
        1,
        3,
        height as i32,
        width as i32,
    ])
}

/// Inverts [`image_to_tensor`], recovering displayable RGB pixels.
pub fn tensor_to_image<B: Backend>(input: &Tensor<B, 4>) -> RgbImage {
    let [_, _, height, width] = input.shape().dims::<4>();
    let values = input
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("input tensor conversion");

    let hw = height * width;
    let mut image = RgbImage::new(width as u32, height as u32);
    for v in 0..height {
        for u in 0..width {
            let idx = v * width + u;
            let mut rgb = [0u8; 3];
            for channel in 0..3 {
                let value = values[channel * hw + idx] * IMAGENET_STD[channel]
                    + IMAGENET_MEAN[channel];
                rgb[channel] = (value * 255.0).round().clamp(0.0, 255.0) as u8;
            }
            image.put_pixel(u as u32, v as u32, image::Rgb(rgb));
        }
    }
    image
}

/// Full pipeline: decode, resize to the color resolution, normalize, batch.
pub fn prepare_input<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<Tensor<B, 4>, ImageDecodeError> {
    let image = load_png(path)?;
    let (width, height) = COLOR_IMAGE_SIZE;
    let resized = if image.dimensions() == (width, height) {
        image
    } else {
        imageops::resize(&image, width, height, imageops::FilterType::Triangle)
    };
    Ok(image_to_tensor(&resized, device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn image_tensor_is_normalized_chw() {
        let device = <TestBackend as Backend>::Device::default();
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        image.put_pixel(1, 0, image::Rgb([0, 0, 255]));

        let tensor = image_to_tensor::<TestBackend>(&image, &device);
        assert_eq!(tensor.shape().dims::<4>(), [1, 3, 1, 2]);

        let values = tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let zero_red = (0.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((values[0] - red).abs() < 1e-6);
        assert!((values[1] - zero_red).abs() < 1e-6);
    }

    #[test]
    fn tensor_to_image_inverts_the_normalization() {
        let device = <TestBackend as Backend>::Device::default();
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgb([10, 128, 200]));
        image.put_pixel(1, 1, image::Rgb([255, 0, 42]));

        let tensor = image_to_tensor::<TestBackend>(&image, &device);
        let recovered = tensor_to_image(&tensor);
        for (original, roundtrip) in image.pixels().zip(recovered.pixels()) {
            for channel in 0..3 {
                assert!(original[channel].abs_diff(roundtrip[channel]) <= 1);
            }
        }
    }

    #[test]
    fn non_png_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.jpg");
        let image = RgbImage::new(4, 4);
        image.save_with_format(&path, ImageFormat::Jpeg).unwrap();

        let err = load_png(&path).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Format { .. }));
    }

    #[test]
    fn missing_input_is_an_open_error() {
        let err = load_png(Path::new("/nonexistent/input.png")).unwrap_err();
        assert!(matches!(err, ImageDecodeError::Open { .. }));
    }
}
