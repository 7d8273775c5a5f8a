//! mesh-pose info command - display mesh statistics and principal axes.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_pose::{Mesh, NormalizeConfig};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MeshInfo {
    path: String,
    vertices: usize,
    faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<BoundsInfo>,
    surface_area: f64,
    mean_edge_length: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal_axes: Option<AxesInfo>,
}

#[derive(Serialize)]
struct BoundsInfo {
    min: [f64; 3],
    max: [f64; 3],
    dimensions: [f64; 3],
}

#[derive(Serialize)]
struct AxesInfo {
    mean: [f64; 3],
    axes: [[f64; 3]; 3],
    eigenvalues: [f64; 3],
    /// Angle between the primary axis and the configured target axis.
    target_angle_degrees: f64,
}

pub fn run(input: &Path, config_path: Option<&Path>, cli: &Cli) -> Result<()> {
    let config = match config_path {
        Some(path) => NormalizeConfig::from_file(path)
            .with_context(|| format!("config {} is not usable", path.display()))?,
        None => NormalizeConfig::default(),
    };
    let mesh = Mesh::load(input).with_context(|| format!("cannot inspect {}", input.display()))?;

    let bounds = mesh.bounds().map(|(min, max)| BoundsInfo {
        min: min.coords.into(),
        max: max.coords.into(),
        dimensions: (max - min).into(),
    });

    // Degenerate clouds still get the rest of the report.
    let axes_result = mesh.principal_axes();
    let principal_axes = axes_result.as_ref().ok().map(|axes| {
        let target = config.target_axis();
        let angle = axes.primary().angle(&target).to_degrees();
        AxesInfo {
            mean: [axes.mean.x, axes.mean.y, axes.mean.z],
            axes: axes.axes.map(|a| [a.x, a.y, a.z]),
            eigenvalues: axes.eigenvalues,
            target_angle_degrees: angle.min(180.0 - angle),
        }
    });

    let info = MeshInfo {
        path: input.to_string_lossy().into_owned(),
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
        bounds,
        surface_area: mesh.surface_area(),
        mean_edge_length: mesh.mean_edge_length(),
        principal_axes,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&info, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Scan".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Vertices".cyan(), info.vertices);
                println!("  {}: {}", "Faces".cyan(), info.faces);
                println!("  {}: {:.4}", "Surface area".cyan(), info.surface_area);
                println!("  {}: {:.4}", "Mean edge".cyan(), info.mean_edge_length);

                if let Some(extent) = info.bounds.as_ref().map(|b| b.dimensions) {
                    println!(
                        "  {}: {:.2} x {:.2} x {:.2}",
                        "Extent".cyan(),
                        extent[0],
                        extent[1],
                        extent[2]
                    );
                }

                match (&info.principal_axes, &axes_result) {
                    (Some(p), _) => {
                        println!("{}", "Principal Axes".bold().underline());
                        for (i, (axis, value)) in p.axes.iter().zip(&p.eigenvalues).enumerate() {
                            println!(
                                "  {} {}: ({:+.4}, {:+.4}, {:+.4})  variance {:.4}",
                                "Axis".cyan(),
                                i + 1,
                                axis[0],
                                axis[1],
                                axis[2],
                                value
                            );
                        }
                        println!(
                            "  {}: {:.2}°",
                            "Off target".cyan(),
                            p.target_angle_degrees
                        );
                    }
                    (None, Err(e)) => {
                        output::warning(&format!("No principal axes: {}", e), cli.format, cli.quiet);
                    }
                    (None, Ok(_)) => {}
                }
            }
        }
    }

    Ok(())
}
