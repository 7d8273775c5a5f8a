//! Normalization settings, loadable from TOML or JSON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! target_axis = [0.0, 0.0, 1.0]
//! centering = "centroid"
//! target_edge_length = 0.5
//!
//! [orientation]
//! flip_axis = "view_axis"
//! ```

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::align::{RotationPivot, unit_axis};
use crate::center::CenteringPolicy;
use crate::error::{PoseError, PoseResult};
use crate::orient::FlipAxis;
use crate::remesh::RemeshParams;

/// Settings for the landmark-based orientation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Run the check at all.
    pub enabled: bool,
    /// Axis of the corrective half turn.
    pub flip_axis: FlipAxis,
    /// Side length of the rendered view in pixels.
    pub resolution: u32,
    /// Direction the projector looks along.
    pub view_direction: [f64; 3],
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flip_axis: FlipAxis::AlignmentAxis,
            resolution: 256,
            view_direction: [0.0, 0.0, -1.0],
        }
    }
}

impl OrientationConfig {
    pub fn view_direction(&self) -> Vector3<f64> {
        Vector3::from(self.view_direction)
    }
}

/// Full normalization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Direction the dominant principal axis is rotated onto.
    pub target_axis: [f64; 3],
    /// Whether the rotation keeps the mean in place.
    pub pivot: RotationPivot,
    /// Reference point moved to the origin.
    pub centering: CenteringPolicy,
    /// Remesh to this edge length; `None` skips remeshing.
    pub target_edge_length: Option<f64>,
    /// Tuning for the built-in remesher.
    pub remesh: RemeshParams,
    /// On a rejected remesh, keep the aligned, unremeshed mesh instead of
    /// failing.
    pub keep_unremeshed_on_failure: bool,
    pub orientation: OrientationConfig,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_axis: [0.0, 1.0, 0.0],
            pivot: RotationPivot::default(),
            centering: CenteringPolicy::default(),
            target_edge_length: None,
            remesh: RemeshParams::default(),
            keep_unremeshed_on_failure: false,
            orientation: OrientationConfig::default(),
        }
    }
}

impl NormalizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_axis(&self) -> Vector3<f64> {
        Vector3::from(self.target_axis)
    }

    /// Axis of the orientation half turn.
    pub fn flip_axis(&self) -> Vector3<f64> {
        match self.orientation.flip_axis {
            FlipAxis::AlignmentAxis => self.target_axis(),
            FlipAxis::ViewAxis => self.orientation.view_direction(),
        }
    }

    pub fn with_target_axis(mut self, axis: [f64; 3]) -> Self {
        self.target_axis = axis;
        self
    }

    pub fn with_centering(mut self, centering: CenteringPolicy) -> Self {
        self.centering = centering;
        self
    }

    pub fn with_pivot(mut self, pivot: RotationPivot) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_target_edge_length(mut self, length: Option<f64>) -> Self {
        self.target_edge_length = length;
        self
    }

    pub fn with_keep_unremeshed(mut self, keep: bool) -> Self {
        self.keep_unremeshed_on_failure = keep;
        self
    }

    pub fn with_orientation(mut self, enabled: bool) -> Self {
        self.orientation.enabled = enabled;
        self
    }

    /// Check every value is usable.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidAxis`] for a zero or non-finite target axis or
    /// view direction, [`PoseError::InvalidConfig`] for other out-of-range
    /// values.
    pub fn validate(&self) -> PoseResult<()> {
        unit_axis(&self.target_axis())?;
        unit_axis(&self.orientation.view_direction())?;

        if let Some(length) = self.target_edge_length {
            if !(length.is_finite() && length > 0.0) {
                return Err(PoseError::invalid_config(format!(
                    "target_edge_length must be a positive finite number, got {}",
                    length
                )));
            }
        }
        if self.orientation.resolution < 16 {
            return Err(PoseError::invalid_config(format!(
                "orientation.resolution must be at least 16, got {}",
                self.orientation.resolution
            )));
        }
        self.remesh.validate()
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(toml_str: &str) -> PoseResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| PoseError::ConfigParse {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoseResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| PoseError::ConfigParse {
            details: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a JSON string.
    pub fn from_json(json_str: &str) -> PoseResult<Self> {
        let config: Self = serde_json::from_str(json_str).map_err(|e| PoseError::ConfigParse {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.json` or `.toml` file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> PoseResult<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            let contents = std::fs::read_to_string(path).map_err(|e| PoseError::ConfigParse {
                details: format!("{}: {}", path.display(), e),
            })?;
            Self::from_json(&contents)
        } else {
            Self::from_toml_file(path)
        }
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> PoseResult<String> {
        toml::to_string_pretty(self).map_err(|e| PoseError::ConfigParse {
            details: e.to_string(),
        })
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> PoseResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PoseError::ConfigParse {
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NormalizeConfig::default();
        assert_eq!(config.target_axis, [0.0, 1.0, 0.0]);
        assert_eq!(config.centering, CenteringPolicy::BoundingBox);
        assert_eq!(config.pivot, RotationPivot::RestoreMean);
        assert!(config.target_edge_length.is_none());
        assert!(config.orientation.enabled);
        assert!(!config.keep_unremeshed_on_failure);
        assert_eq!(config.flip_axis(), Vector3::y());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = NormalizeConfig::from_toml(
            r#"
            target_axis = [0.0, 0.0, 2.0]
            centering = "centroid"
            pivot = "origin_at_mean"
            target_edge_length = 0.5
            keep_unremeshed_on_failure = true

            [orientation]
            flip_axis = "view_axis"

            [remesh]
            iterations = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.target_axis, [0.0, 0.0, 2.0]);
        assert_eq!(config.centering, CenteringPolicy::Centroid);
        assert_eq!(config.pivot, RotationPivot::OriginAtMean);
        assert_eq!(config.target_edge_length, Some(0.5));
        assert!(config.keep_unremeshed_on_failure);
        assert_eq!(config.orientation.flip_axis, FlipAxis::ViewAxis);
        assert_eq!(config.flip_axis(), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(config.orientation.resolution, 256);
        assert_eq!(config.remesh.iterations, 8);
        assert_eq!(config.remesh.smoothing_factor, 0.5);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = NormalizeConfig::default()
            .with_target_axis([1.0, 0.0, 0.0])
            .with_centering(CenteringPolicy::Centroid)
            .with_target_edge_length(Some(1.25))
            .with_orientation(false);
        let text = config.to_toml().unwrap();
        assert_eq!(NormalizeConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = NormalizeConfig::default().with_pivot(RotationPivot::OriginAtMean);
        let text = config.to_json().unwrap();
        assert!(text.contains("origin_at_mean"));
        assert_eq!(NormalizeConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            NormalizeConfig::from_toml("target_axis = [0.0, 0.0, 0.0]"),
            Err(PoseError::InvalidAxis { .. })
        ));
        assert!(matches!(
            NormalizeConfig::from_toml("target_edge_length = -1.0"),
            Err(PoseError::InvalidConfig { .. })
        ));
        assert!(matches!(
            NormalizeConfig::from_toml("centering = \"median\""),
            Err(PoseError::ConfigParse { .. })
        ));
        assert!(matches!(
            NormalizeConfig::from_toml("[orientation]\nresolution = 4"),
            Err(PoseError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("pose.toml");
        std::fs::write(&toml_path, "centering = \"centroid\"").unwrap();
        let json_path = dir.path().join("pose.json");
        std::fs::write(&json_path, r#"{"target_edge_length": 2.0}"#).unwrap();

        assert_eq!(
            NormalizeConfig::from_file(&toml_path).unwrap().centering,
            CenteringPolicy::Centroid
        );
        assert_eq!(
            NormalizeConfig::from_file(&json_path).unwrap().target_edge_length,
            Some(2.0)
        );
        assert!(matches!(
            NormalizeConfig::from_file(dir.path().join("missing.toml")),
            Err(PoseError::ConfigParse { .. })
        ));
    }
}
