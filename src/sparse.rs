//! Sparse volumetric tensors.
//!
//! The reconstruction outputs store only active voxels as coordinate/feature
//! pairs; dense grids are materialized on demand at export time.

use burn::prelude::*;

/// Active voxels of a volume, as `[batch, x, y, z]` coordinates paired with
/// one scalar feature each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVolume {
    coordinates: Vec<[i32; 4]>,
    features: Vec<f32>,
}

impl SparseVolume {
    pub fn new(coordinates: Vec<[i32; 4]>, features: Vec<f32>) -> Self {
        assert_eq!(
            coordinates.len(),
            features.len(),
            "every sparse coordinate needs exactly one feature"
        );
        Self {
            coordinates,
            features,
        }
    }

    pub fn push(&mut self, coordinate: [i32; 4], feature: f32) {
        self.coordinates.push(coordinate);
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[[i32; 4]] {
        &self.coordinates
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    /// Spatial coordinates with the leading batch-index column dropped,
    /// ready for point-cloud export.
    pub fn spatial_points(&self) -> Vec<[f32; 3]> {
        self.coordinates
            .iter()
            .map(|&[_, x, y, z]| [x as f32, y as f32, z as f32])
            .collect()
    }

    /// Materializes the sparse volume as a dense `[1, 1, X, Y, Z]` tensor,
    /// filling unseen voxels with `default_value`. Coordinates are shifted by
    /// `min_coordinate`; entries outside the grid are dropped.
    pub fn dense<B: Backend>(
        &self,
        dimensions: [usize; 5],
        min_coordinate: [i32; 3],
        default_value: f32,
        device: &B::Device,
    ) -> Tensor<B, 5> {
        let [batch, channels, dim_x, dim_y, dim_z] = dimensions;
        debug_assert_eq!(batch, 1);
        debug_assert_eq!(channels, 1);

        let mut grid = vec![default_value; dim_x * dim_y * dim_z];
        for (&[_, x, y, z], &feature) in self.coordinates.iter().zip(&self.features) {
            let x = x - min_coordinate[0];
            let y = y - min_coordinate[1];
            let z = z - min_coordinate[2];
            if x < 0 || y < 0 || z < 0 {
                continue;
            }
            let (x, y, z) = (x as usize, y as usize, z as usize);
            if x >= dim_x || y >= dim_y || z >= dim_z {
                continue;
            }
            grid[(x * dim_y + y) * dim_z + z] = feature;
        }

        Tensor::<B, 1>::from_floats(grid.as_slice(), device).reshape([
            1,
            1,
            dim_x as i32,
            dim_y as i32,
            dim_z as i32,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn to_vec(tensor: Tensor<TestBackend, 5>) -> Vec<f32> {
        tensor
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn empty_volume_densifies_to_the_default_value() {
        let device = <TestBackend as Backend>::Device::default();
        let volume = SparseVolume::default();
        let dense = volume.dense::<TestBackend>([1, 1, 2, 3, 4], [0, 0, 0], 3.0, &device);

        assert_eq!(dense.shape().dims::<5>(), [1, 1, 2, 3, 4]);
        assert!(to_vec(dense).iter().all(|&v| v == 3.0));
    }

    #[test]
    fn features_land_at_their_coordinates() {
        let device = <TestBackend as Backend>::Device::default();
        let volume = SparseVolume::new(vec![[0, 1, 2, 3], [0, 0, 0, 0]], vec![-0.5, 1.5]);
        let dense = volume.dense::<TestBackend>([1, 1, 2, 3, 4], [0, 0, 0], 0.0, &device);

        let values = to_vec(dense);
        assert_eq!(values[(1 * 3 + 2) * 4 + 3], -0.5);
        assert_eq!(values[0], 1.5);
        assert_eq!(values.iter().filter(|&&v| v != 0.0).count(), 2);
    }

    #[test]
    fn out_of_grid_entries_are_dropped() {
        let device = <TestBackend as Backend>::Device::default();
        let volume = SparseVolume::new(vec![[0, 9, 0, 0], [0, -1, 0, 0]], vec![1.0, 2.0]);
        let dense = volume.dense::<TestBackend>([1, 1, 2, 2, 2], [0, 0, 0], 0.0, &device);

        assert!(to_vec(dense).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn min_coordinate_shifts_the_grid_origin() {
        let device = <TestBackend as Backend>::Device::default();
        let volume = SparseVolume::new(vec![[0, 10, 10, 10]], vec![7.0]);
        let dense = volume.dense::<TestBackend>([1, 1, 2, 2, 2], [10, 10, 9], 0.0, &device);

        let values = to_vec(dense);
        assert_eq!(values[(0 * 2 + 0) * 2 + 1], 7.0);
    }

    #[test]
    fn spatial_points_drop_the_batch_column() {
        let volume = SparseVolume::new(vec![[0, 4, 5, 6]], vec![1.0]);
        assert_eq!(volume.spatial_points(), vec![[4.0, 5.0, 6.0]]);
    }
}
