//! The standardize → project → reconstruct round-trip.
//!
//! A run produces seven named artifacts in a fixed order. Either all of them are
//! produced or the run fails with the first error from the standardizer or the
//! PCA engine; no artifact reaches a sink from a failed run.

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::dataset::{component_labels, Dataset};
use crate::error::{PcaError, Result};
use crate::pca::PcaModel;
use crate::sink::ArtifactSink;
use crate::standardize::StandardizationModel;

/// Names of the artifacts a pipeline run produces, in production order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactName {
    Raw,
    Standardized,
    ExplainedVarianceRatio,
    Components,
    Scores,
    ReconstructedStandardized,
    ReconstructedRaw,
}

impl ArtifactName {
    pub const ALL: [ArtifactName; 7] = [
        ArtifactName::Raw,
        ArtifactName::Standardized,
        ArtifactName::ExplainedVarianceRatio,
        ArtifactName::Components,
        ArtifactName::Scores,
        ArtifactName::ReconstructedStandardized,
        ArtifactName::ReconstructedRaw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactName::Raw => "raw",
            ArtifactName::Standardized => "standardized",
            ArtifactName::ExplainedVarianceRatio => "explained_variance_ratio",
            ArtifactName::Components => "components",
            ArtifactName::Scores => "scores",
            ArtifactName::ReconstructedStandardized => "reconstructed_standardized",
            ArtifactName::ReconstructedRaw => "reconstructed_raw",
        }
    }

    /// Position in the pipeline, 0-based.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// `00_raw.csv`, `01_standardized.csv`, ...
    pub fn file_name(&self) -> String {
        format!("{:02}_{}.csv", self.index(), self.as_str())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named table produced by a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: ArtifactName,
    pub table: Dataset,
}

/// The two models fitted during one run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FittedModels {
    pub standardization: StandardizationModel,
    pub pca: PcaModel,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    artifacts: Vec<Artifact>,
    models: FittedModels,
}

impl PipelineOutput {
    /// All seven artifacts in pipeline order.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn artifact(&self, name: ArtifactName) -> &Dataset {
        &self.artifacts[name.index()].table
    }

    pub fn models(&self) -> &FittedModels {
        &self.models
    }

    pub fn into_parts(self) -> (Vec<Artifact>, FittedModels) {
        (self.artifacts, self.models)
    }

    /// Mean squared error between `raw` and `reconstructed_raw` over all cells.
    pub fn reconstruction_error(&self) -> f64 {
        let raw = self.artifact(ArtifactName::Raw).values();
        let recovered = self.artifact(ArtifactName::ReconstructedRaw).values();
        let diff = &raw - &recovered;
        diff.mapv(|x| x * x).mean().unwrap_or(0.0)
    }
}

/// Runs the full round-trip for a fixed number of retained components.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    rank: usize,
}

impl Pipeline {
    pub fn new(rank: usize) -> Self {
        Self { rank }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Runs every stage on `raw` and returns the seven artifacts with the fitted models.
    ///
    /// # Errors
    /// `InvalidRank` before any fitting if the rank does not fit the dataset's width;
    /// otherwise whatever the standardizer or the PCA engine reports, unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use pca_roundtrip::{ArtifactName, Dataset, Pipeline};
    ///
    /// let raw = Dataset::from_values(array![
    ///     [1.0, 2.0, 3.0],
    ///     [4.0, 5.0, 6.0],
    ///     [7.0, 8.0, 8.0],
    ///     [2.0, 1.0, 0.0],
    /// ]).unwrap();
    /// let output = Pipeline::new(2).run(&raw).unwrap();
    /// assert_eq!(output.artifact(ArtifactName::Scores).n_columns(), 2);
    /// ```
    pub fn run(&self, raw: &Dataset) -> Result<PipelineOutput> {
        let n_features = raw.n_columns();
        if self.rank == 0 || self.rank > n_features {
            return Err(PcaError::InvalidRank {
                requested: self.rank,
                n_features,
            });
        }
        log::info!(
            "Starting PCA round-trip on {} rows x {} columns with rank {}",
            raw.n_rows(),
            n_features,
            self.rank
        );
        let run_start_time = Instant::now();

        let standardization = StandardizationModel::fit(raw)?;
        let standardized = raw.with_values(standardization.transform(raw.values())?)?;
        log::info!("Standardized input in {:?}", run_start_time.elapsed());

        let pca = PcaModel::fit(standardized.values(), self.rank)?;
        let pc_labels = component_labels(self.rank);

        let explained_variance_ratio = Dataset::new(
            vec![ArtifactName::ExplainedVarianceRatio.as_str().to_string()],
            Some(pc_labels.clone()),
            pca.explained_variance_ratio().clone().insert_axis(Axis(1)),
        )?;
        let components = Dataset::new(
            raw.columns().to_vec(),
            Some(pc_labels.clone()),
            pca.components().clone(),
        )?;

        let scores_matrix = pca.transform(standardized.values())?;
        let scores = Dataset::new(
            pc_labels,
            raw.row_ids().map(|ids| ids.to_vec()),
            scores_matrix,
        )?;

        let reconstructed_standardized =
            raw.with_values(pca.inverse_transform(scores.values())?)?;
        let reconstructed_raw = raw.with_values(
            standardization.inverse_transform(reconstructed_standardized.values())?,
        )?;

        let artifacts = vec![
            Artifact {
                name: ArtifactName::Raw,
                table: raw.clone(),
            },
            Artifact {
                name: ArtifactName::Standardized,
                table: standardized,
            },
            Artifact {
                name: ArtifactName::ExplainedVarianceRatio,
                table: explained_variance_ratio,
            },
            Artifact {
                name: ArtifactName::Components,
                table: components,
            },
            Artifact {
                name: ArtifactName::Scores,
                table: scores,
            },
            Artifact {
                name: ArtifactName::ReconstructedStandardized,
                table: reconstructed_standardized,
            },
            Artifact {
                name: ArtifactName::ReconstructedRaw,
                table: reconstructed_raw,
            },
        ];

        let output = PipelineOutput {
            artifacts,
            models: FittedModels { standardization, pca },
        };
        log::info!(
            "Finished PCA round-trip in {:?}; reconstruction MSE {:.6e}",
            run_start_time.elapsed(),
            output.reconstruction_error()
        );
        Ok(output)
    }

    /// Runs the pipeline, then hands each artifact to `sink` in pipeline order.
    ///
    /// The sink sees nothing unless every stage succeeded. Emission stops at the first
    /// sink error, so artifacts accepted before it (for example files already written by
    /// a [`CsvDirectorySink`](crate::sink::CsvDirectorySink)) are left in place.
    pub fn run_into(&self, raw: &Dataset, sink: &mut dyn ArtifactSink) -> Result<PipelineOutput> {
        let output = self.run(raw)?;
        for artifact in output.artifacts() {
            sink.accept(artifact)?;
        }
        Ok(output)
    }
}
