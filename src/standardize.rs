use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::dataset::{positional_labels, Dataset};
use crate::error::{PcaError, Result};

/// A column whose standard deviation is at or below this multiple of its largest
/// magnitude is treated as constant. Tiny but genuinely varying columns pass.
pub const DEGENERATE_STD_RELATIVE_TOLERANCE: f64 = f64::EPSILON;

/// Per-column centering and scaling statistics, fit once on a reference dataset.
///
/// `scale` holds population standard deviations (ddof = 0) and is strictly positive:
/// a zero-variance column makes `fit` fail instead of being clamped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StandardizationModel {
    /// Shape: (n_features)
    mean: Array1<f64>,
    /// Shape: (n_features)
    scale: Array1<f64>,
}

impl StandardizationModel {
    /// Fits mean and standard deviation for every column of `dataset`.
    ///
    /// # Errors
    /// `EmptyInput` for zero rows or columns, `DegenerateColumn` naming the first
    /// constant column.
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        Self::fit_labeled(dataset.values(), dataset.columns())
    }

    /// Same as [`fit`](Self::fit) for an unlabeled matrix; columns are reported by position.
    pub fn fit_matrix(data: ArrayView2<f64>) -> Result<Self> {
        Self::fit_labeled(data, &positional_labels(data.ncols()))
    }

    fn fit_labeled(data: ArrayView2<f64>, columns: &[String]) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(PcaError::EmptyInput);
        }
        let mean = data.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;
        let scale = data.std_axis(Axis(0), 0.0);

        let magnitude = data.fold_axis(Axis(0), 0.0f64, |m, &x| m.max(x.abs()));
        if let Some((idx, &std_dev)) = scale
            .iter()
            .zip(magnitude.iter())
            .enumerate()
            .find(|(_, (s, m))| !(**s > DEGENERATE_STD_RELATIVE_TOLERANCE * **m))
            .map(|(idx, (s, _))| (idx, s))
        {
            return Err(PcaError::DegenerateColumn {
                column: columns
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| idx.to_string()),
                std_dev,
            });
        }

        log::debug!(
            "Fitted standardization on {} rows x {} columns",
            data.nrows(),
            data.ncols()
        );
        Ok(Self { mean, scale })
    }

    /// Checks that stored statistics satisfy the invariants `fit` guarantees.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(PcaError::Serialization(format!(
                "Standardization mean ({}) and scale ({}) lengths differ",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.is_empty() {
            return Err(PcaError::Serialization("Standardization model has no features".into()));
        }
        if self.scale.iter().any(|&s| !s.is_finite() || s <= 0.0) {
            return Err(PcaError::Serialization(
                "Standardization scale contains non-finite or non-positive values".into(),
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(PcaError::Serialization(
                "Standardization mean contains non-finite values".into(),
            ));
        }
        Ok(())
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// `(value - mean[col]) / scale[col]` for every entry.
    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_columns(data, "standardization transform")?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(row.view_mut())
                .and(self.mean.view())
                .and(self.scale.view())
                .for_each(|v, &m, &s| *v = (*v - m) / s);
        }
        Ok(out)
    }

    /// `value * scale[col] + mean[col]` for every entry.
    pub fn inverse_transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_columns(data, "standardization inverse transform")?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            Zip::from(row.view_mut())
                .and(self.mean.view())
                .and(self.scale.view())
                .for_each(|v, &m, &s| *v = *v * s + m);
        }
        Ok(out)
    }

    fn check_columns(&self, data: ArrayView2<f64>, context: &'static str) -> Result<()> {
        if data.ncols() != self.n_features() {
            return Err(PcaError::DimensionMismatch {
                context,
                expected: self.n_features(),
                found: data.ncols(),
            });
        }
        Ok(())
    }
}
