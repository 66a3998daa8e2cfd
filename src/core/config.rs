//! Streaming configuration
//!
//! Tuning knobs for the resolution pipeline: per-stage streaming radii,
//! the vertical distance weight, the queue scan budget, and executor
//! sizing. Loadable from a JSON file; every field has a sensible default
//! so partial files work.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// Configuration for the streaming pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Horizontal radius (in chunks) kept loaded around a focus
    pub load_radius: i32,
    /// Vertical radius (in chunks) kept loaded around a focus
    pub load_height_radius: i32,
    /// Horizontal radius kept meshed (must be strictly inside the load
    /// radius so every mesh build finds its neighbor voxel data resident)
    pub mesh_radius: i32,
    /// Vertical radius kept meshed
    pub mesh_height_radius: i32,
    /// Horizontal radius kept visible
    pub visibility_radius: i32,
    /// Vertical radius kept visible
    pub visibility_height_radius: i32,
    /// Multiplier applied to the vertical component of chunk distances.
    /// Values above 1.0 favor horizontal streaming over vertical.
    pub vertical_weight: f32,
    /// Queue entries an aperture examines per try_next_job call
    pub scan_budget: usize,
    /// Chunk journal retention; None keeps every entry
    pub journal_capacity: Option<usize>,
    /// Worker threads for job execution; 0 runs jobs inline on the
    /// scheduling thread
    pub executor_workers: usize,
    /// Background focus-tracker sample interval in milliseconds
    pub focus_sample_interval_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 4,
            load_height_radius: 2,
            mesh_radius: 3,
            mesh_height_radius: 1,
            visibility_radius: 3,
            visibility_height_radius: 1,
            vertical_weight: 1.5,
            scan_budget: 20,
            journal_capacity: Some(64),
            executor_workers: 2,
            focus_sample_interval_ms: 25,
        }
    }
}

impl StreamingConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the radii relationships the pipeline relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if self.load_radius < 1 || self.load_height_radius < 0 {
            return Err(Error::Config("load radius out of range".into()));
        }
        if self.mesh_radius >= self.load_radius
            || self.mesh_height_radius >= self.load_height_radius
        {
            return Err(Error::Config(
                "mesh radii must be strictly inside the load radii".into(),
            ));
        }
        if self.visibility_radius > self.mesh_radius
            || self.visibility_height_radius > self.mesh_height_radius
        {
            return Err(Error::Config(
                "visibility radii must not exceed mesh radii".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = StreamingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_budget, 20);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "load_radius": 6, "vertical_weight": 2.0 }}"#).unwrap();

        let config = StreamingConfig::load(file.path()).unwrap();
        assert_eq!(config.load_radius, 6);
        assert_eq!(config.vertical_weight, 2.0);
        // Unspecified fields fall back to defaults
        assert_eq!(config.mesh_radius, StreamingConfig::default().mesh_radius);
    }

    #[test]
    fn test_rejects_inverted_radii() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "load_radius": 2, "mesh_radius": 5 }}"#).unwrap();

        assert!(StreamingConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = StreamingConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let back: StreamingConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.load_radius, config.load_radius);
        assert_eq!(back.journal_capacity, config.journal_capacity);
    }
}
