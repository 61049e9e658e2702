//! Robust regression loss for reconstruction training.

use burn::prelude::*;

use crate::error::LossError;

/// How the elementwise loss collapses to a scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

/// Smooth-L1-style robust loss: quadratic inside the `beta` band, linear
/// outside it. The two branches agree in value and slope at `|diff| == beta`.
pub fn reconstruction_loss<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    target: Tensor<B, D>,
    beta: f32,
    reduction: Reduction,
) -> Result<Tensor<B, 1>, LossError> {
    if beta <= 0.0 {
        return Err(LossError::InvalidArgument(format!(
            "beta must be positive, got {beta}"
        )));
    }

    let diff = (input - target).abs();
    let outside_band = diff.clone().greater_equal_elem(beta).float();

    let quadratic = (diff.clone() * diff.clone()).mul_scalar(0.5 / beta);
    let linear = diff.add_scalar(-0.5 * beta);

    let loss = quadratic * (outside_band.clone().neg().add_scalar(1.0)) + linear * outside_band;

    Ok(match reduction {
        Reduction::Mean => loss.mean(),
        Reduction::Sum => loss.sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn loss_of(values: &[f32], targets: &[f32], beta: f32, reduction: Reduction) -> f32 {
        let device = <TestBackend as Backend>::Device::default();
        let input = Tensor::<TestBackend, 1>::from_floats(values, &device);
        let target = Tensor::<TestBackend, 1>::from_floats(targets, &device);
        reconstruction_loss(input, target, beta, reduction)
            .unwrap()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()[0]
    }

    #[test]
    fn branches_agree_at_the_band_boundary() {
        for beta in [1.0 / 9.0, 0.5, 1.0, 3.0] {
            // |diff| == beta: quadratic gives 0.5 * beta^2 / beta, linear beta - 0.5 * beta
            let at_boundary = loss_of(&[beta], &[0.0], beta, Reduction::Sum);
            assert!((at_boundary - 0.5 * beta).abs() < 1e-6, "beta = {beta}");
        }
    }

    #[test]
    fn quadratic_inside_linear_outside() {
        let beta = 1.0;
        let inside = loss_of(&[0.5], &[0.0], beta, Reduction::Sum);
        assert!((inside - 0.5 * 0.25 / beta).abs() < 1e-6);

        let outside = loss_of(&[2.0], &[0.0], beta, Reduction::Sum);
        assert!((outside - (2.0 - 0.5 * beta)).abs() < 1e-6);
    }

    #[test]
    fn zero_iff_prediction_matches_target() {
        let exact = loss_of(&[1.0, -2.0, 0.25], &[1.0, -2.0, 0.25], 1.0, Reduction::Mean);
        assert_eq!(exact, 0.0);

        let off = loss_of(&[1.0, -2.0, 0.25], &[1.0, -2.0, 0.5], 1.0, Reduction::Mean);
        assert!(off > 0.0);
    }

    #[test]
    fn mean_and_sum_reductions_differ_by_the_count() {
        let values = [2.0, 3.0, 4.0, 5.0];
        let targets = [0.0; 4];
        let sum = loss_of(&values, &targets, 1.0, Reduction::Sum);
        let mean = loss_of(&values, &targets, 1.0, Reduction::Mean);
        assert!((sum - mean * 4.0).abs() < 1e-5);
    }

    #[test]
    fn non_positive_beta_is_rejected() {
        let device = <TestBackend as Backend>::Device::default();
        for beta in [0.0, -1.0] {
            let input = Tensor::<TestBackend, 1>::from_floats([1.0], &device);
            let target = Tensor::<TestBackend, 1>::from_floats([0.0], &device);
            let err = reconstruction_loss(input, target, beta, Reduction::Mean).unwrap_err();
            assert!(matches!(err, LossError::InvalidArgument(_)));
        }
    }
}
