//! mesh-pose: command-line front end for canonical pose normalization.
//!
//! Brings scanned meshes into a common frame (principal axis aligned,
//! centered, right side up) for scripting and batch jobs.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_pose=info` - Basic operation logging
//! - `RUST_LOG=mesh_pose=debug` - Per-stage details
//! - `RUST_LOG=mesh_pose::timing=debug` - Performance timing
//! - `RUST_LOG=mesh_pose::batch=info` - Per-file batch outcomes
//!
//! # Example
//!
//! ```bash
//! # Normalize one scan, remeshing to 0.5 mm edges
//! mesh-pose normalize scan.stl -o canonical.ply --edge-length 0.5
//!
//! # Normalize a directory on four threads
//! RUST_LOG=mesh_pose::batch=info mesh-pose batch scans/ -o canonical/ --jobs 4
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{batch, info, normalize};

/// mesh-pose - Canonical pose normalization for 3D scans.
#[derive(Parser)]
#[command(name = "mesh-pose")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the pose of a single mesh
    Normalize {
        /// Input mesh file
        input: PathBuf,

        /// Output file path (format determined by extension)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: NormalizeArgs,
    },

    /// Normalize every mesh file in a directory
    Batch {
        /// Directory of input meshes
        input_dir: PathBuf,

        /// Directory for normalized copies (same file names)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: NormalizeArgs,

        /// Worker threads (defaults to one per core)
        #[arg(long, short)]
        jobs: Option<usize>,
    },

    /// Display mesh statistics and principal axes
    Info {
        /// Input mesh file
        input: PathBuf,

        /// Config file whose target axis is compared against
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Settings shared by `normalize` and `batch`. Flags override the config file.
#[derive(Args, Clone)]
pub struct NormalizeArgs {
    /// TOML or JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target axis for the dominant direction, as x,y,z
    #[arg(long, value_parser = parse_axis, allow_hyphen_values = true)]
    pub axis: Option<[f64; 3]>,

    /// Reference point moved to the origin
    #[arg(long)]
    pub centering: Option<CenteringArg>,

    /// Where the aligned cloud is left relative to its mean
    #[arg(long)]
    pub pivot: Option<PivotArg>,

    /// Remesh to this target edge length
    #[arg(long)]
    pub edge_length: Option<f64>,

    /// Write the unremeshed mesh if remeshing is rejected
    #[arg(long)]
    pub keep_unremeshed: bool,

    /// Axis of the upside-down correction
    #[arg(long)]
    pub flip_axis: Option<FlipAxisArg>,

    /// Skip the landmark orientation check
    #[arg(long)]
    pub no_orientation: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CenteringArg {
    /// Midpoint of the bounding box
    BoundingBox,
    /// Mean of the vertices
    Centroid,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PivotArg {
    /// Rotate about the mean and keep it in place
    RestoreMean,
    /// Leave the mean at the origin
    OriginAtMean,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FlipAxisArg {
    /// The target axis
    Alignment,
    /// The projection direction
    View,
}

fn parse_axis(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z but got '{}'", s));
    }
    let mut axis = [0.0; 3];
    for (slot, part) in axis.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    Ok(axis)
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_pose=info",
            2 => "mesh_pose=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Normalize {
            input,
            output,
            options,
        } => normalize::run(input, output, options, &cli),
        Commands::Batch {
            input_dir,
            output,
            options,
            jobs,
        } => batch::run(input_dir, output, options, *jobs, &cli),
        Commands::Info { input, config } => info::run(input, config.as_deref(), &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(pose_err) = e.downcast_ref::<mesh_pose::PoseError>() {
                eprintln!("{}: {}", "Error".red().bold(), pose_err);
                eprintln!("  {}: {}", "Code".cyan(), pose_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    pose_err.recovery_suggestion()
                );
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
