//! songdkl - birdsong divergence and syllable counting from the command line
//!
//! Results go to stdout as tab-separated lines (or JSON with `--json`);
//! logs go to stderr.

mod cli;
mod config;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use songdkl::PipelineConfig;
use tracing::{debug, info};

use crate::cli::{apply_sweep, Cli, Command, CommonArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    debug!("songdkl v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Calculate { path1, path2, n_syl1, n_syl2, common, json } => {
            let config = resolve_config(&common)?;
            let result = songdkl::calculate_from_path(&path1, &path2, n_syl1, n_syl2, &config)
                .with_context(|| {
                    format!(
                        "Failed to calculate Song D(KL) for {} and {}",
                        path1.display(),
                        path2.display()
                    )
                })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    path1.display(),
                    path2.display(),
                    n_syl1,
                    n_syl2,
                    result.basis.len(),
                    result.dkl_pq,
                    result.dkl_qp,
                    result.n_psds_ref,
                    result.n_psds_compare
                );
            }
        }

        Command::Numsyls {
            path,
            common,
            min_components,
            max_components,
            n_splits,
            psds_per_syl,
            json,
        } => {
            let config = apply_sweep(
                resolve_config(&common)?,
                min_components,
                max_components,
                n_splits,
                psds_per_syl,
            );
            let result = songdkl::numsyls_from_path(&path, &config).with_context(|| {
                format!("Failed to estimate syllable count for {}", path.display())
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}\t{}", path.display(), result.n_syls());
            }
        }

        Command::Prep { dirs, output_dir, common } => {
            let config = resolve_config(&common)?;
            let saved = songdkl::prep_and_save(&dirs, &output_dir, &config)
                .context("Failed to prepare datasets")?;
            for path in saved {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

/// Config file, then command-line flags on top
fn resolve_config(common: &CommonArgs) -> Result<PipelineConfig> {
    let (file_config, source) = config::load(common.config.as_deref())?;
    match source.as_deref().map(Path::display) {
        Some(path) => info!("Configuration loaded from {}", path),
        None => debug!("No config file, using defaults"),
    }
    Ok(common.apply(file_config))
}
