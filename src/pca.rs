// Principal component analysis (PCA) engine

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{PcaError, Result};
use crate::linalg_backends::{BackendEigh, NdarrayLinAlgBackend};

/// Norms below this mean the backend returned a zero eigenvector.
const NORMALIZATION_THRESHOLD: f64 = 1e-12;
/// Relative tolerance under which two eigenvalues are reported as tied.
const EIGENVALUE_TIE_RELATIVE_TOLERANCE: f64 = 1e-9;
/// Unit-norm slack accepted when validating a loaded model.
const UNIT_NORM_TOLERANCE: f64 = 1e-6;

/// A fitted, fixed-rank principal component model.
///
/// Built once by [`PcaModel::fit`] and immutable afterwards. The model keeps the
/// training mean so that `transform` re-centers its input; for standardized input this
/// mean is (numerically) zero, but it is stored anyway so projection and reconstruction
/// are exact inverses on the retained subspace for any input.
///
/// Component sign convention: every component is flipped so that its
/// largest-magnitude loading is positive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PcaModel {
    /// Principal axes as rows, ordered by descending explained variance.
    /// Shape: (k_components, n_features)
    components: Array2<f64>,
    /// Mean of the training data.
    /// Shape: (n_features)
    mean: Array1<f64>,
    /// Eigenvalues of the training covariance for the retained components.
    /// Shape: (k_components)
    explained_variance: Array1<f64>,
    /// `explained_variance / total_variance`.
    /// Shape: (k_components)
    explained_variance_ratio: Array1<f64>,
    /// Sum of all `n_features` eigenvalues of the training covariance.
    total_variance: f64,
    /// Mean of the discarded eigenvalues, 0 when nothing was discarded.
    noise_variance: f64,
    n_samples: usize,
}

impl PcaModel {
    /// Fits a rank-`rank` PCA model on `data` using the covariance eigendecomposition.
    ///
    /// * `data` - Shape (n_samples, n_features); normally the output of the standardizer.
    /// * `rank` - Number of components to retain, `1 <= rank <= n_features`.
    ///
    /// Fewer samples than features is allowed: the trailing components then carry
    /// (near-)zero explained variance.
    ///
    /// # Errors
    /// - `EmptyInput` for zero rows or columns.
    /// - `InvalidRank` if `rank` is outside `[1, n_features]`; checked before any numeric work.
    /// - `InsufficientSamples` for fewer than 2 rows.
    /// - `NonFiniteValue` for NaN/infinite input.
    /// - `Decomposition` if the eigen solver fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use pca_roundtrip::PcaModel;
    ///
    /// let data = array![[1.0, 2.0], [3.0, 4.5], [5.0, 5.5]];
    /// let model = PcaModel::fit(data.view(), 1).unwrap();
    /// assert_eq!(model.rank(), 1);
    /// ```
    pub fn fit(data: ArrayView2<f64>, rank: usize) -> Result<Self> {
        Self::fit_with_backend(data, rank, &NdarrayLinAlgBackend)
    }

    /// [`fit`](Self::fit) with an explicit eigen solver.
    pub fn fit_with_backend<B: BackendEigh<f64>>(
        data: ArrayView2<f64>,
        rank: usize,
        backend: &B,
    ) -> Result<Self> {
        let n_samples = data.nrows();
        let n_features = data.ncols();

        if n_features == 0 {
            return Err(PcaError::EmptyInput);
        }
        if rank == 0 || rank > n_features {
            return Err(PcaError::InvalidRank {
                requested: rank,
                n_features,
            });
        }
        if n_samples == 0 {
            return Err(PcaError::EmptyInput);
        }
        if n_samples < 2 {
            return Err(PcaError::InsufficientSamples {
                required: 2,
                found: n_samples,
            });
        }
        if let Some(((row, column), _)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PcaError::NonFiniteValue { row, column });
        }
        if n_samples <= n_features {
            log::warn!(
                "Fitting PCA on {} samples with {} features; trailing components will carry near-zero variance.",
                n_samples,
                n_features
            );
        }

        let fit_start_time = Instant::now();

        let mean_vector = data.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;
        let centered = &data - &mean_vector;

        let mut cov_matrix = centered.t().dot(&centered);
        cov_matrix /= (n_samples - 1) as f64;

        let eigh = backend
            .eigh_upper(&cov_matrix)
            .map_err(|e| PcaError::Decomposition(e.to_string()))?;
        if eigh.eigenvalues.len() != n_features || eigh.eigenvectors.dim() != (n_features, n_features) {
            return Err(PcaError::Decomposition(format!(
                "backend returned {} eigenvalues and a {:?} eigenvector matrix for a {}x{} covariance",
                eigh.eigenvalues.len(),
                eigh.eigenvectors.dim(),
                n_features,
                n_features
            )));
        }

        let mut eig_pairs: Vec<(f64, Array1<f64>)> = eigh
            .eigenvalues
            .into_iter()
            .map(|val| val.max(0.0))
            .zip(eigh.eigenvectors.columns().into_iter().map(|col| col.to_owned()))
            .collect();
        eig_pairs.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let total_variance: f64 = eig_pairs.iter().map(|(v, _)| *v).sum();
        log::debug!(
            "Covariance eigenvalues (descending): {:?}",
            eig_pairs.iter().map(|(v, _)| *v).collect::<Vec<_>>()
        );
        warn_on_eigenvalue_ties(&eig_pairs, rank);

        let mut components = Array2::<f64>::zeros((rank, n_features));
        let mut explained_variance = Array1::<f64>::zeros(rank);
        for (i, (eig_val, eig_vec)) in eig_pairs.iter().take(rank).enumerate() {
            let norm = eig_vec.dot(eig_vec).sqrt();
            if norm <= NORMALIZATION_THRESHOLD {
                return Err(PcaError::Decomposition(format!(
                    "eigenvector {} has near-zero norm {:e}",
                    i, norm
                )));
            }
            let mut axis = eig_vec / norm;
            if largest_magnitude_entry(&axis) < 0.0 {
                axis.mapv_inplace(|x| -x);
            }
            components.row_mut(i).assign(&axis);
            explained_variance[i] = *eig_val;
        }

        let explained_variance_ratio = if total_variance > 0.0 {
            explained_variance.mapv(|v| v / total_variance)
        } else {
            Array1::zeros(rank)
        };

        let discarded = n_features - rank;
        let noise_variance = if discarded == 0 {
            0.0
        } else {
            eig_pairs[rank..].iter().map(|(v, _)| *v).sum::<f64>() / discarded as f64
        };

        log::info!(
            "Fitted PCA with {} of {} components on {} samples in {:?} (retained variance ratio {:.4})",
            rank,
            n_features,
            n_samples,
            fit_start_time.elapsed(),
            explained_variance_ratio.sum()
        );

        Ok(Self {
            components,
            mean: mean_vector,
            explained_variance,
            explained_variance_ratio,
            total_variance,
            noise_variance,
            n_samples,
        })
    }

    /// Projects rows onto the retained components: `(row - mean) · componentsᵀ`.
    ///
    /// Returns scores of shape (n_rows, k_components).
    ///
    /// # Errors
    /// `DimensionMismatch` if `data` does not have `n_features` columns.
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(PcaError::DimensionMismatch {
                context: "PCA transform",
                expected: self.n_features(),
                found: data.ncols(),
            });
        }
        let centered = &data - &self.mean;
        Ok(centered.dot(&self.components.t()))
    }

    /// Maps scores back to feature space: `scores · components + mean`.
    ///
    /// Exact only on the retained subspace; whatever variance lay in the
    /// `n_features - k` discarded directions is gone.
    ///
    /// # Errors
    /// `DimensionMismatch` if `scores` does not have `k_components` columns.
    pub fn inverse_transform(&self, scores: ArrayView2<f64>) -> Result<Array2<f64>> {
        if scores.ncols() != self.rank() {
            return Err(PcaError::DimensionMismatch {
                context: "PCA inverse transform",
                expected: self.rank(),
                found: scores.ncols(),
            });
        }
        Ok(scores.dot(&self.components) + &self.mean)
    }

    pub fn rank(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Principal axes, one unit-length row per component.
    /// Shape: (k_components, n_features)
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Eigenvalues of the training covariance for the retained components, descending.
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    /// Fraction of the total variance captured by each retained component.
    /// Sums to at most 1, reaching 1 only when every component is kept.
    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    pub fn cumulative_explained_variance_ratio(&self) -> Array1<f64> {
        let mut running = 0.0;
        self.explained_variance_ratio.mapv(|r| {
            running += r;
            running
        })
    }

    pub fn total_variance(&self) -> f64 {
        self.total_variance
    }

    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Checks a deserialized model against the invariants `fit` guarantees.
    pub(crate) fn validate(&self) -> Result<()> {
        let k = self.components.nrows();
        let d = self.components.ncols();
        if k == 0 || d == 0 || k > d {
            return Err(PcaError::Serialization(format!(
                "PCA model has an invalid component matrix shape ({}, {})",
                k, d
            )));
        }
        if self.mean.len() != d {
            return Err(PcaError::Serialization(format!(
                "PCA model mean length ({}) does not match component width ({})",
                self.mean.len(),
                d
            )));
        }
        if self.explained_variance.len() != k || self.explained_variance_ratio.len() != k {
            return Err(PcaError::Serialization(format!(
                "PCA model has {} components but {} variances and {} ratios",
                k,
                self.explained_variance.len(),
                self.explained_variance_ratio.len()
            )));
        }
        if self
            .explained_variance
            .iter()
            .any(|&v| !v.is_finite() || v < 0.0)
        {
            return Err(PcaError::Serialization(
                "PCA model explained variance contains negative or non-finite values".into(),
            ));
        }
        if self
            .explained_variance_ratio
            .iter()
            .any(|&r| !r.is_finite() || !(0.0..=1.0 + UNIT_NORM_TOLERANCE).contains(&r))
        {
            return Err(PcaError::Serialization(
                "PCA model explained variance ratio is outside [0, 1]".into(),
            ));
        }
        for (i, row) in self.components.rows().into_iter().enumerate() {
            let norm = row.dot(&row).sqrt();
            if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
                return Err(PcaError::Serialization(format!(
                    "PCA component {} has norm {} instead of 1",
                    i, norm
                )));
            }
        }
        Ok(())
    }
}

fn largest_magnitude_entry(v: &Array1<f64>) -> f64 {
    v.iter()
        .copied()
        .fold(0.0, |best, x| if x.abs() > best.abs() { x } else { best })
}

/// Component order is unstable among (near-)equal eigenvalues. This only matters for
/// the retained ones and for the boundary between retained and discarded.
fn warn_on_eigenvalue_ties(sorted_pairs: &[(f64, Array1<f64>)], rank: usize) {
    let largest = sorted_pairs.first().map_or(0.0, |(v, _)| *v);
    if largest <= 0.0 {
        return;
    }
    let epsilon = largest * EIGENVALUE_TIE_RELATIVE_TOLERANCE;
    let last_checked = rank.min(sorted_pairs.len().saturating_sub(1));
    for i in 0..last_checked {
        let (a, b) = (sorted_pairs[i].0, sorted_pairs[i + 1].0);
        if a > epsilon && float_cmp::approx_eq!(f64, a, b, epsilon = epsilon, ulps = 4) {
            log::warn!(
                "Eigenvalues of components {} and {} are numerically tied ({} vs {}); their order and directions are not unique.",
                i + 1,
                i + 2,
                a,
                b
            );
        }
    }
}
