use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pca_roundtrip::{execute, CsvLayout, RunConfig, DEFAULT_RANK};

#[derive(Parser, Debug)]
#[command(
    name = "pca-roundtrip",
    version,
    about = "Standardize a CSV table, reduce it with PCA, and reconstruct it from the retained components"
)]
struct Cli {
    /// CSV file to analyse.
    #[arg(long)]
    input: PathBuf,
    /// Number of principal components to retain.
    #[arg(long, default_value_t = DEFAULT_RANK)]
    rank: usize,
    /// The first line is data, not column names.
    #[arg(long)]
    no_header: bool,
    /// The first column is data, not row identifiers.
    #[arg(long)]
    no_row_ids: bool,
    /// Directory for the numbered artifact CSV files (created if missing).
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Write the fitted standardization and PCA models to this file.
    #[arg(long)]
    save_model: Option<PathBuf>,
}

impl From<Cli> for RunConfig {
    fn from(cli: Cli) -> Self {
        RunConfig {
            input: cli.input,
            rank: cli.rank,
            layout: CsvLayout {
                has_header: !cli.no_header,
                has_row_ids: !cli.no_row_ids,
            },
            output_dir: cli.output_dir,
            save_model: cli.save_model,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RunConfig::from(Cli::parse());
    let output = execute(&config)
        .with_context(|| format!("PCA round-trip failed for {:?}", config.input))?;

    log::info!(
        "Retained {} components explaining {:.2}% of the variance; reconstruction MSE {:.6e}",
        config.rank,
        output.models().pca.explained_variance_ratio().sum() * 100.0,
        output.reconstruction_error()
    );
    Ok(())
}
