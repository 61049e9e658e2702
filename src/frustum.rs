//! Visibility frustum mask.
//!
//! The mask is a precomputed boolean voxel grid marking which cells of the
//! reconstruction volume fall inside the camera's field of view. It is stored
//! as a packed `.npz` archive under the array name `mask` and loaded once per
//! run.

use std::fs::File;
use std::path::Path;

use burn::prelude::*;
use ndarray::Array3;
use ndarray_npy::NpzReader;

use crate::error::AssetError;

/// Array name inside the `.npz` archive.
pub const FRUSTUM_MASK_KEY: &str = "mask.npy";

/// Loads the frustum mask and reshapes it to `[1, 1, X, Y, Z]` for
/// broadcasting against batch and channel dimensions.
pub fn load_frustum_mask<B: Backend>(
    path: &Path,
    grid_dimensions: [usize; 3],
    device: &B::Device,
) -> Result<Tensor<B, 5, Bool>, AssetError> {
    if !path.exists() {
        return Err(AssetError::FrustumMaskMissing(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|err| AssetError::FrustumMask {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let mut archive = NpzReader::new(file).map_err(|err| AssetError::FrustumMask {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let mask: Array3<bool> =
        archive
            .by_name(FRUSTUM_MASK_KEY)
            .map_err(|err| AssetError::FrustumMask {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

    let found = mask.shape().to_vec();
    if found != grid_dimensions {
        return Err(AssetError::FrustumMaskShape {
            expected: grid_dimensions,
            found,
        });
    }

    // ndarray iterates in C order, matching the tensor's row-major layout.
    let flags: Vec<bool> = mask.iter().copied().collect();
    let count = flags.len();
    let [x, y, z] = grid_dimensions;

    Ok(
        Tensor::<B, 1, Bool>::from_data(TensorData::new(flags, [count]), device).reshape([
            1,
            1,
            x as i32,
            y as i32,
            z as i32,
        ]),
    )
}

/// Reads the mask back to host memory as a flat row-major vector.
pub fn mask_to_flags<B: Backend>(mask: &Tensor<B, 5, Bool>) -> Vec<bool> {
    mask.clone()
        .into_data()
        .to_vec::<bool>()
        .expect("frustum mask conversion")
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray_npy::NpzWriter;

    type TestBackend = NdArray<f32>;

    fn write_mask(path: &Path, mask: &Array3<bool>) {
        let mut writer = NpzWriter::new(File::create(path).unwrap());
        writer.add_array("mask", mask).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn mask_loads_with_leading_singleton_dims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frustum_mask.npz");
        let mut mask = Array3::<bool>::from_elem((4, 3, 2), false);
        mask[[1, 2, 0]] = true;
        write_mask(&path, &mask);

        let device = <TestBackend as Backend>::Device::default();
        let tensor = load_frustum_mask::<TestBackend>(&path, [4, 3, 2], &device).unwrap();
        assert_eq!(tensor.shape().dims::<5>(), [1, 1, 4, 3, 2]);

        let flags = mask_to_flags(&tensor);
        assert_eq!(flags.iter().filter(|&&f| f).count(), 1);
        assert!(flags[(1 * 3 + 2) * 2]);
    }

    #[test]
    fn missing_mask_file_is_reported() {
        let device = <TestBackend as Backend>::Device::default();
        let err = load_frustum_mask::<TestBackend>(
            Path::new("/nonexistent/frustum_mask.npz"),
            [4, 4, 4],
            &device,
        )
        .unwrap_err();
        assert!(matches!(err, AssetError::FrustumMaskMissing(_)));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frustum_mask.npz");
        write_mask(&path, &Array3::<bool>::from_elem((2, 2, 2), true));

        let device = <TestBackend as Backend>::Device::default();
        let err =
            load_frustum_mask::<TestBackend>(&path, [4, 4, 4], &device).unwrap_err();
        assert!(matches!(err, AssetError::FrustumMaskShape { .. }));
    }
}
