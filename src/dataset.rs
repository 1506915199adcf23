use ndarray::{Array2, ArrayView2};

use crate::error::{PcaError, Result};

/// A labeled numeric table: rows of samples, columns of features.
///
/// Column identifiers are always present. Row identifiers are optional and, when present,
/// travel with the rows through every pipeline stage. Values are stored as a dense
/// `(n_rows, n_columns)` matrix and are guaranteed finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    row_ids: Option<Vec<String>>,
    values: Array2<f64>,
}

impl Dataset {
    /// Builds a dataset after checking that labels match the value shape and that
    /// every value is finite.
    ///
    /// # Errors
    /// `InvalidDataset` if the column or row label counts disagree with `values`,
    /// `NonFiniteValue` if any entry is NaN or infinite.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use pca_roundtrip::Dataset;
    ///
    /// let ds = Dataset::new(
    ///     vec!["a".into(), "b".into()],
    ///     Some(vec!["r0".into(), "r1".into()]),
    ///     array![[1.0, 2.0], [3.0, 4.0]],
    /// ).unwrap();
    /// assert_eq!(ds.n_columns(), 2);
    /// ```
    pub fn new(
        columns: Vec<String>,
        row_ids: Option<Vec<String>>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(PcaError::InvalidDataset(format!(
                "{} column identifiers for {} value columns",
                columns.len(),
                values.ncols()
            )));
        }
        if let Some(ids) = row_ids.as_ref() {
            if ids.len() != values.nrows() {
                return Err(PcaError::InvalidDataset(format!(
                    "{} row identifiers for {} value rows",
                    ids.len(),
                    values.nrows()
                )));
            }
        }
        if let Some(((row, column), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PcaError::NonFiniteValue { row, column });
        }
        Ok(Self {
            columns,
            row_ids,
            values,
        })
    }

    /// Builds a dataset with positional column names `"0"`, `"1"`, ... and no row identifiers.
    pub fn from_values(values: Array2<f64>) -> Result<Self> {
        let columns = positional_labels(values.ncols());
        Self::new(columns, None, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_ids(&self) -> Option<&[String]> {
        self.row_ids.as_deref()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Returns a dataset with the same labels and new values of identical shape.
    pub(crate) fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        Self::new(self.columns.clone(), self.row_ids.clone(), values)
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }
}

/// `"0"`, `"1"`, ... used when a source has no header row.
pub fn positional_labels(n: usize) -> Vec<String> {
    (0..n).map(|i| i.to_string()).collect()
}

/// `"PC1"`, `"PC2"`, ... naming retained principal components.
pub fn component_labels(k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("PC{}", i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_mismatched_column_labels() {
        let err = Dataset::new(vec!["a".into()], None, array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, PcaError::InvalidDataset(_)));
    }

    #[test]
    fn rejects_mismatched_row_labels() {
        let err = Dataset::new(
            vec!["a".into(), "b".into()],
            Some(vec!["only".into()]),
            array![[1.0, 2.0], [3.0, 4.0]],
        )
        .unwrap_err();
        assert!(matches!(err, PcaError::InvalidDataset(_)));
    }

    #[test]
    fn rejects_nan_values() {
        let err = Dataset::from_values(array![[1.0, f64::NAN], [3.0, 4.0]]).unwrap_err();
        match err {
            PcaError::NonFiniteValue { row, column } => {
                assert_eq!((row, column), (0, 1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn positional_and_component_labels() {
        assert_eq!(positional_labels(3), vec!["0", "1", "2"]);
        assert_eq!(component_labels(2), vec!["PC1", "PC2"]);
        let ds = Dataset::from_values(array![[1.0, 2.0]]).unwrap();
        assert_eq!(ds.columns(), &["0".to_string(), "1".to_string()]);
        assert!(ds.row_ids().is_none());
    }
}
