//! Consumers of pipeline artifacts: display through the `log` facade, CSV files on disk,
//! or both.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::csv_io::write_dataset;
use crate::dataset::Dataset;
use crate::error::{PcaError, Result};
use crate::pipeline::Artifact;

/// Receives each artifact of a successful pipeline run, in pipeline order.
pub trait ArtifactSink {
    fn accept(&mut self, artifact: &Artifact) -> Result<()>;
}

/// Collects artifacts in memory.
impl ArtifactSink for Vec<Artifact> {
    fn accept(&mut self, artifact: &Artifact) -> Result<()> {
        self.push(artifact.clone());
        Ok(())
    }
}

/// Renders every artifact as an aligned text table at `info` level.
#[derive(Debug, Clone)]
pub struct LogSink {
    precision: usize,
}

impl Default for LogSink {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

impl LogSink {
    pub fn with_precision(precision: usize) -> Self {
        Self { precision }
    }
}

impl ArtifactSink for LogSink {
    fn accept(&mut self, artifact: &Artifact) -> Result<()> {
        log::info!(
            "\n{}\n{}",
            artifact.name,
            render_table(&artifact.table, self.precision)
        );
        Ok(())
    }
}

/// Formats a dataset as a right-aligned text table with column and row labels.
pub fn render_table(dataset: &Dataset, precision: usize) -> String {
    let row_labels: Vec<String> = match dataset.row_ids() {
        Some(ids) => ids.to_vec(),
        None => (0..dataset.n_rows()).map(|i| i.to_string()).collect(),
    };
    let cells: Vec<Vec<String>> = dataset
        .values()
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| format!("{:.*}", precision, v)).collect())
        .collect();

    let label_width = row_labels.iter().map(|l| l.len()).max().unwrap_or(0);
    let col_widths: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            cells
                .iter()
                .map(|r| r[j].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let _ = write!(out, "{:width$}", "", width = label_width);
    for (name, width) in dataset.columns().iter().zip(&col_widths) {
        let _ = write!(out, "  {:>width$}", name, width = *width);
    }
    for (label, row) in row_labels.iter().zip(&cells) {
        out.push('\n');
        let _ = write!(out, "{:<width$}", label, width = label_width);
        for (cell, width) in row.iter().zip(&col_widths) {
            let _ = write!(out, "  {:>width$}", cell, width = *width);
        }
    }
    out
}

/// Writes each artifact to `<dir>/<NN>_<name>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    dir: PathBuf,
}

impl CsvDirectorySink {
    /// Creates the output directory (and parents) if missing.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| PcaError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for CsvDirectorySink {
    fn accept(&mut self, artifact: &Artifact) -> Result<()> {
        let path = self.dir.join(artifact.name.file_name());
        write_dataset(&path, &artifact.table)?;
        log::debug!("Wrote {} to {:?}", artifact.name, path);
        Ok(())
    }
}

/// Forwards every artifact to each inner sink in turn.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ArtifactSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ArtifactSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ArtifactSink for FanoutSink {
    fn accept(&mut self, artifact: &Artifact) -> Result<()> {
        for sink in self.sinks.iter_mut() {
            sink.accept(artifact)?;
        }
        Ok(())
    }
}
