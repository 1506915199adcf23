use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{PcaError, Result};
use crate::pipeline::FittedModels;

/// Saves the fitted standardization and PCA models to a file using bincode.
///
/// # Errors
/// `Io` if the file cannot be created, `Serialization` if encoding fails.
pub fn save_models<P: AsRef<Path>>(path: P, models: &FittedModels) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| PcaError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    bincode::serde::encode_into_std_write(models, &mut writer, bincode::config::standard())
        .map_err(|e| PcaError::Serialization(format!("Failed to serialize models: {}", e)))?;
    writer.flush().map_err(|e| PcaError::io(path, e))?;
    log::info!("Saved fitted models to {:?}", path);
    Ok(())
}

/// Loads models previously written by [`save_models`].
///
/// The loaded models are checked against the invariants a fresh fit guarantees:
/// positive scales, unit-length components, non-negative variances, and matching
/// feature counts between the two models.
pub fn load_models<P: AsRef<Path>>(path: P) -> Result<FittedModels> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PcaError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let models: FittedModels =
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
            .map_err(|e| PcaError::Serialization(format!("Failed to deserialize models: {}", e)))?;

    models.standardization.validate()?;
    models.pca.validate()?;
    if models.standardization.n_features() != models.pca.n_features() {
        return Err(PcaError::Serialization(format!(
            "Standardization model has {} features but PCA model has {}",
            models.standardization.n_features(),
            models.pca.n_features()
        )));
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dataset, Pipeline, StandardizationModel};
    use ndarray::array;

    fn fitted() -> FittedModels {
        let raw = Dataset::from_values(array![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 8.0],
            [2.0, 1.0, 0.0]
        ])
        .unwrap();
        Pipeline::new(2).run(&raw).unwrap().models().clone()
    }

    #[test]
    fn saved_models_load_back_and_transform_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.bin");
        let models = fitted();
        save_models(&path, &models).unwrap();
        let loaded = load_models(&path).unwrap();
        assert_eq!(loaded, models);

        let sample = array![[3.0, 3.0, 3.0]];
        let z = loaded.standardization.transform(sample.view()).unwrap();
        assert_eq!(
            loaded.pca.transform(z.view()).unwrap(),
            models.pca.transform(z.view()).unwrap()
        );
    }

    #[test]
    fn garbage_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(matches!(
            load_models(&path),
            Err(PcaError::Serialization(_))
        ));
    }

    #[test]
    fn mismatched_feature_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.bin");
        let two_features = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0]];
        let models = FittedModels {
            standardization: StandardizationModel::fit_matrix(two_features.view()).unwrap(),
            pca: fitted().pca,
        };
        save_models(&path, &models).unwrap();
        assert!(matches!(
            load_models(&path),
            Err(PcaError::Serialization(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_models(dir.path().join("absent.bin")),
            Err(PcaError::Io { .. })
        ));
    }
}
