//! mesh-pose batch command - normalize a directory of meshes.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mesh_pose::{BatchReport, Normalizer, jobs_for_directory, normalize_batch};

use crate::{Cli, NormalizeArgs, OutputFormat, output};

pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    args: &NormalizeArgs,
    jobs: Option<usize>,
    cli: &Cli,
) -> Result<()> {
    let config = super::build_config(args)?;
    let normalizer = Normalizer::new(config)?;

    let batch_jobs = jobs_for_directory(input_dir, output_dir)
        .with_context(|| format!("Failed to list meshes in {:?}", input_dir))?;
    if batch_jobs.is_empty() {
        output::warning(
            &format!("No STL, OBJ or PLY files in {}", input_dir.display()),
            cli.format,
            cli.quiet,
        );
    }

    tracing::info!(
        input = %input_dir.display(),
        meshes = batch_jobs.len(),
        threads = ?jobs,
        "Starting batch command"
    );
    let report = match jobs {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to start worker threads")?
            .install(|| normalize_batch(&normalizer, &batch_jobs)),
        None => normalize_batch(&normalizer, &batch_jobs),
    };

    print_report(&report, cli);

    if !report.all_succeeded() {
        bail!(
            "{} of {} meshes failed to normalize",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}

fn print_report(report: &BatchReport, cli: &Cli) {
    match cli.format {
        OutputFormat::Json => output::print(report, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return;
            }
            for success in &report.succeeded {
                output::success(
                    &format!(
                        "{} → {} ({} faces)",
                        success.input.display(),
                        success.output.display(),
                        success.faces
                    ),
                    cli.format,
                    cli.quiet,
                );
            }
            for success in report.succeeded.iter().filter(|s| s.remesh_fallback.is_some()) {
                output::warning(
                    &format!("{} was written without remeshing", success.input.display()),
                    cli.format,
                    cli.quiet,
                );
            }
            for failure in &report.failed {
                eprintln!(
                    "{} {} [{}] {}",
                    "✗".red().bold(),
                    failure.input.display(),
                    failure.code.cyan(),
                    failure.message
                );
            }
            println!(
                "{}: {} succeeded, {} failed",
                "Batch".bold(),
                report.succeeded.len(),
                report.failed.len()
            );
        }
    }
}
