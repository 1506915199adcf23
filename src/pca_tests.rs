use crate::error::PcaError;
use crate::linalg_backends::{BackendEigh, EighOutput};
use crate::PcaModel;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Axis};
use ndarray_linalg::SVD;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::error::Error;

/// Correlated gaussian data: a few latent factors mixed into `n_features` columns plus noise.
fn generate_correlated_data(n_samples: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let n_latent = 2.min(n_features);
    let latent = Array2::from_shape_fn((n_samples, n_latent), |_| normal.sample(&mut rng));
    let mixing = Array2::from_shape_fn((n_latent, n_features), |_| normal.sample(&mut rng));
    let noise = Array2::from_shape_fn((n_samples, n_features), |_| 0.1 * normal.sample(&mut rng));
    latent.dot(&mixing) + noise
}

fn mean_squared_error(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let diff = a - b;
    diff.mapv(|x| x * x).mean().unwrap()
}

#[cfg(test)]
mod fit_tests {
    use super::*;

    #[test]
    fn test_axis_aligned_variances() {
        // Var(x) = 2/3, Var(y) = 1/6, no covariance.
        let data = array![[1.0, 0.0], [-1.0, 0.0], [0.0, 0.5], [0.0, -0.5]];
        let model = PcaModel::fit(data.view(), 2).unwrap();

        assert_abs_diff_eq!(model.explained_variance()[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.explained_variance()[1], 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.explained_variance_ratio()[0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(model.explained_variance_ratio()[1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(model.total_variance(), 5.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.noise_variance(), 0.0, epsilon = 1e-15);

        // Sign convention makes the dominant loading positive.
        assert_abs_diff_eq!(model.components()[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.components()[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_components_are_orthonormal() {
        let data = generate_correlated_data(60, 7, 42);
        let model = PcaModel::fit(data.view(), 5).unwrap();
        let gram = model.components().dot(&model.components().t());
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_explained_variance_is_descending_and_ratios_bounded() {
        let data = generate_correlated_data(40, 6, 7);
        for k in 1..=6 {
            let model = PcaModel::fit(data.view(), k).unwrap();
            let ev = model.explained_variance();
            for w in ev.windows(2) {
                assert!(w[0] >= w[1], "explained variance not descending: {:?}", ev);
            }
            let ratio = model.explained_variance_ratio();
            assert!(ratio.iter().all(|&r| (0.0..=1.0).contains(&r)));
            let total: f64 = ratio.sum();
            assert!(total <= 1.0 + 1e-12, "ratio sum {} exceeds 1 for k={}", total, k);
            if k < 6 {
                assert!(total < 1.0);
            } else {
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
            }
            let cumulative = model.cumulative_explained_variance_ratio();
            assert_abs_diff_eq!(cumulative[k - 1], total, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_explained_variance_matches_svd_of_centered_data() {
        let data = generate_correlated_data(30, 5, 3);
        let n = data.nrows() as f64;
        let centered = &data - &data.mean_axis(Axis(0)).unwrap();
        let (_, singular_values, _) = centered.svd(false, false).unwrap();

        let model = PcaModel::fit(data.view(), 4).unwrap();
        for i in 0..4 {
            let expected = singular_values[i].powi(2) / (n - 1.0);
            assert_abs_diff_eq!(model.explained_variance()[i], expected, epsilon = 1e-9);
        }
        let discarded = singular_values[4].powi(2) / (n - 1.0);
        assert_abs_diff_eq!(model.noise_variance(), discarded, epsilon = 1e-9);
    }

    #[test]
    fn test_rank_deficient_input_has_zero_trailing_variance() {
        // 3 samples span at most a 2-dimensional centered subspace.
        let data = generate_correlated_data(3, 5, 11);
        let model = PcaModel::fit(data.view(), 5).unwrap();
        for i in 2..5 {
            assert_abs_diff_eq!(model.explained_variance()[i], 0.0, epsilon = 1e-9);
        }
        assert_eq!(model.n_samples(), 3);
    }

    #[test]
    fn test_invalid_rank_is_rejected() {
        let data = generate_correlated_data(10, 3, 1);
        for bad in [0, 4] {
            match PcaModel::fit(data.view(), bad) {
                Err(PcaError::InvalidRank { requested, n_features }) => {
                    assert_eq!(requested, bad);
                    assert_eq!(n_features, 3);
                }
                other => panic!("expected InvalidRank, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rank_is_checked_before_sample_count() {
        let data = array![[1.0, 2.0]];
        assert!(matches!(
            PcaModel::fit(data.view(), 3),
            Err(PcaError::InvalidRank { .. })
        ));
    }

    #[test]
    fn test_fit_insufficient_samples() {
        let data = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            PcaModel::fit(data.view(), 1),
            Err(PcaError::InsufficientSamples { required: 2, found: 1 })
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite() {
        let data = array![[1.0, 2.0], [f64::INFINITY, 3.0], [0.0, 1.0]];
        assert!(matches!(
            PcaModel::fit(data.view(), 1),
            Err(PcaError::NonFiniteValue { row: 1, column: 0 })
        ));
    }

    struct FailingBackend;

    impl BackendEigh<f64> for FailingBackend {
        fn eigh_upper(&self, _matrix: &Array2<f64>) -> Result<EighOutput<f64>, Box<dyn Error + Send + Sync>> {
            Err("solver did not converge".into())
        }
    }

    #[test]
    fn test_backend_failure_becomes_decomposition_error() {
        let data = generate_correlated_data(10, 3, 5);
        match PcaModel::fit_with_backend(data.view(), 2, &FailingBackend) {
            Err(PcaError::Decomposition(msg)) => assert!(msg.contains("did not converge")),
            other => panic!("expected Decomposition error, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod transform_tests {
    use super::*;

    #[test]
    fn test_full_rank_round_trip_is_exact() {
        let data = generate_correlated_data(25, 4, 99);
        let model = PcaModel::fit(data.view(), 4).unwrap();
        let scores = model.transform(data.view()).unwrap();
        let back = model.inverse_transform(scores.view()).unwrap();
        for (a, b) in data.iter().zip(back.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scores_have_explained_variance() {
        let data = generate_correlated_data(50, 5, 8);
        let model = PcaModel::fit(data.view(), 3).unwrap();
        let scores = model.transform(data.view()).unwrap();
        assert_eq!(scores.dim(), (50, 3));
        let score_var = scores.var_axis(Axis(0), 1.0);
        for i in 0..3 {
            assert_abs_diff_eq!(score_var[i], model.explained_variance()[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reconstruction_error_decreases_with_rank() {
        let data = generate_correlated_data(40, 6, 21);
        let mut previous = f64::INFINITY;
        for k in 1..=6 {
            let model = PcaModel::fit(data.view(), k).unwrap();
            let scores = model.transform(data.view()).unwrap();
            let back = model.inverse_transform(scores.view()).unwrap();
            let mse = mean_squared_error(&data, &back);
            assert!(
                mse <= previous + 1e-12,
                "reconstruction error grew from {} to {} at k={}",
                previous,
                mse,
                k
            );
            previous = mse;
        }
        assert_abs_diff_eq!(previous, 0.0, epsilon = 1e-16);
    }

    #[test]
    fn test_reconstruction_error_equals_discarded_variance() {
        let data = generate_correlated_data(30, 5, 4);
        let n = data.nrows() as f64;
        let d = data.ncols() as f64;
        let model = PcaModel::fit(data.view(), 2).unwrap();
        let back = model
            .inverse_transform(model.transform(data.view()).unwrap().view())
            .unwrap();
        // Sum of squared residuals = (n - 1) * sum of discarded eigenvalues.
        let expected_mse = model.noise_variance() * (d - 2.0) * (n - 1.0) / (n * d);
        assert_abs_diff_eq!(mean_squared_error(&data, &back), expected_mse, epsilon = 1e-9);
    }

    #[test]
    fn test_transform_dimension_mismatch() {
        let data = generate_correlated_data(10, 3, 2);
        let model = PcaModel::fit(data.view(), 2).unwrap();
        assert!(matches!(
            model.transform(array![[1.0, 2.0]].view()),
            Err(PcaError::DimensionMismatch { expected: 3, found: 2, .. })
        ));
        assert!(matches!(
            model.inverse_transform(array![[1.0, 2.0, 3.0]].view()),
            Err(PcaError::DimensionMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn test_transform_empty_rows() {
        let data = generate_correlated_data(10, 3, 2);
        let model = PcaModel::fit(data.view(), 2).unwrap();
        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(model.transform(empty.view()).unwrap().dim(), (0, 2));
    }

    #[test]
    fn test_refit_is_self_consistent() {
        let data = generate_correlated_data(20, 4, 13);
        let a = PcaModel::fit(data.view(), 3).unwrap();
        let b = PcaModel::fit(data.view(), 3).unwrap();
        for (x, y) in a.components().iter().zip(b.components().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }
}
