//! Subcommand implementations.

pub mod batch;
pub mod info;
pub mod normalize;

use anyhow::{Context, Result};
use mesh_pose::{CenteringPolicy, FlipAxis, NormalizeConfig, RotationPivot};

use crate::{CenteringArg, FlipAxisArg, NormalizeArgs, PivotArg};

/// Config from `--config` (or defaults) with command-line overrides applied.
pub fn build_config(args: &NormalizeArgs) -> Result<NormalizeConfig> {
    let mut config = match &args.config {
        Some(path) => NormalizeConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => NormalizeConfig::default(),
    };

    if let Some(axis) = args.axis {
        config.target_axis = axis;
    }
    if let Some(centering) = args.centering {
        config.centering = match centering {
            CenteringArg::BoundingBox => CenteringPolicy::BoundingBox,
            CenteringArg::Centroid => CenteringPolicy::Centroid,
        };
    }
    if let Some(pivot) = args.pivot {
        config.pivot = match pivot {
            PivotArg::RestoreMean => RotationPivot::RestoreMean,
            PivotArg::OriginAtMean => RotationPivot::OriginAtMean,
        };
    }
    if let Some(flip_axis) = args.flip_axis {
        config.orientation.flip_axis = match flip_axis {
            FlipAxisArg::Alignment => FlipAxis::AlignmentAxis,
            FlipAxisArg::View => FlipAxis::ViewAxis,
        };
    }
    if args.edge_length.is_some() {
        config.target_edge_length = args.edge_length;
    }
    if args.keep_unremeshed {
        config.keep_unremeshed_on_failure = true;
    }
    if args.no_orientation {
        config.orientation.enabled = false;
    }

    config.validate()?;
    Ok(config)
}
