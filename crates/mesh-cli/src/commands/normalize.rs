//! mesh-pose normalize command - normalize a single mesh.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_pose::{NormalizeReport, Normalizer, OrientationOutcome, RemeshFallback, RemeshSummary};
use serde::Serialize;

use crate::{Cli, NormalizeArgs, OutputFormat, output};

#[derive(Serialize)]
struct NormalizeResult {
    input: String,
    output: String,
    vertices: usize,
    faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation_degrees: Option<f64>,
    translation: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    elongation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orientation: Option<OrientationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remesh: Option<RemeshSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remesh_fallback: Option<RemeshFallback>,
    operations: Vec<String>,
}

impl NormalizeResult {
    fn new(input: &Path, output: &Path, report: NormalizeReport) -> Self {
        Self {
            input: input.display().to_string(),
            output: output.display().to_string(),
            vertices: report.mesh.vertex_count(),
            faces: report.mesh.face_count(),
            rotation_degrees: report.rotation.map(|r| r.angle().to_degrees()),
            translation: [report.translation.x, report.translation.y, report.translation.z],
            elongation: report.axes_before.as_ref().map(|a| a.elongation()),
            orientation: report.orientation,
            remesh: report.remesh,
            remesh_fallback: report.remesh_fallback,
            operations: report.operation_log,
        }
    }
}

pub fn run(input: &Path, output_path: &Path, args: &NormalizeArgs, cli: &Cli) -> Result<()> {
    let config = super::build_config(args)?;
    let normalizer = Normalizer::new(config)?;

    let report = normalizer.process_file(input, output_path)?;
    let result = NormalizeResult::new(input, output_path, report);

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Normalized {} → {}", input.display(), output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} vertices, {} faces",
                    "Size".cyan(),
                    result.vertices,
                    result.faces
                );
                if let Some(angle) = result.rotation_degrees {
                    println!("  {}: {:.2}°", "Rotation".cyan(), angle);
                }
                if let Some(elongation) = result.elongation {
                    println!("  {}: {:.2}", "Elongation".cyan(), elongation);
                }
                let t = result.translation;
                println!(
                    "  {}: ({:.4}, {:.4}, {:.4})",
                    "Translation".cyan(),
                    t[0],
                    t[1],
                    t[2]
                );
                if let Some(orientation) = result.orientation {
                    println!("  {}: {}", "Orientation".cyan(), orientation);
                }
                if let Some(remesh) = result.remesh {
                    println!(
                        "  {}: {} → {} triangles ({} splits, {} collapses, {} flips)",
                        "Remesh".cyan(),
                        remesh.original_triangles,
                        remesh.final_triangles,
                        remesh.edges_split,
                        remesh.edges_collapsed,
                        remesh.edges_flipped
                    );
                }
                if let Some(fallback) = &result.remesh_fallback {
                    output::warning(
                        &format!("Written without remeshing [{}]: {}", fallback.code, fallback.message),
                        cli.format,
                        cli.quiet,
                    );
                }
                if let Some(elongation) = result.elongation {
                    if elongation < 1.05 {
                        output::warning(
                            "Primary axis is weakly defined; alignment may be unstable",
                            cli.format,
                            cli.quiet,
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
