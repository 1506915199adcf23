// Principal component analysis (PCA) round-trip

#![doc = include_str!("../README.md")]

pub mod config;
pub mod csv_io;
pub mod dataset;
pub mod error;
pub mod linalg_backends;
pub mod pca;
pub mod persistence;
pub mod pipeline;
pub mod sink;
pub mod standardize;

#[cfg(test)]
mod pca_tests;

pub use config::{execute, RunConfig, DEFAULT_RANK};
pub use csv_io::{read_dataset, write_dataset, CsvLayout};
pub use dataset::Dataset;
pub use error::{PcaError, Result};
pub use pca::PcaModel;
pub use persistence::{load_models, save_models};
pub use pipeline::{Artifact, ArtifactName, FittedModels, Pipeline, PipelineOutput};
pub use sink::{ArtifactSink, CsvDirectorySink, FanoutSink, LogSink};
pub use standardize::StandardizationModel;
