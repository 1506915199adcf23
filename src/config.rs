use std::path::PathBuf;

use crate::csv_io::{read_dataset, CsvLayout};
use crate::error::{PcaError, Result};
use crate::persistence::save_models;
use crate::pipeline::{Pipeline, PipelineOutput};
use crate::sink::{CsvDirectorySink, FanoutSink, LogSink};

/// Number of components kept when the caller does not choose one.
pub const DEFAULT_RANK: usize = 2;

/// Parameters of one end-to-end run: where the data lives, how it is laid out,
/// how many components to keep, and where results go.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: PathBuf,
    pub rank: usize,
    pub layout: CsvLayout,
    /// Directory for the numbered artifact CSV files; nothing is written when `None`.
    pub output_dir: Option<PathBuf>,
    /// File for the bincode-encoded fitted models.
    pub save_model: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(input: impl Into<PathBuf>, rank: usize) -> Self {
        Self {
            input: input.into(),
            rank,
            layout: CsvLayout::default(),
            output_dir: None,
            save_model: None,
        }
    }

    /// Rejects settings that cannot work for any dataset.
    /// The upper bound on `rank` depends on the data and is checked by the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            return Err(PcaError::InvalidConfig("rank must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Loads the dataset, runs the pipeline, logs every artifact, and writes the
/// artifact files and model file requested by `config`.
pub fn execute(config: &RunConfig) -> Result<PipelineOutput> {
    config.validate()?;
    log::debug!("Run configuration: {:?}", config);

    let raw = read_dataset(&config.input, config.layout)?;

    let mut sink = FanoutSink::new().with(LogSink::default());
    if let Some(dir) = config.output_dir.as_ref() {
        sink = sink.with(CsvDirectorySink::create(dir)?);
    }

    let output = Pipeline::new(config.rank).run_into(&raw, &mut sink)?;

    if let Some(model_path) = config.save_model.as_ref() {
        save_models(model_path, output.models())?;
    }
    Ok(output)
}
