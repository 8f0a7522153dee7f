use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::geo::quadtree::DEFAULT_MAX_DEPTH;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub geocoder: GeocoderConfig,
    pub ingest: IngestConfig,
}

/// Spatial index shape
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Points a quadtree leaf holds before splitting
    pub capacity: usize,
    /// Depth at which leaves stop splitting and overflow instead
    pub max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Minimum street and postcode similarity for a fuzzy candidate (exclusive)
    pub fuzzy_threshold: f64,
    /// Half-width in degrees of the reverse geocoding search window
    pub reverse_window: f64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.55,
            reverse_window: 0.001,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Only offer ways tagged highway/junction to the builder
    pub routable_only: bool,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.index.capacity, 50);
        assert_eq!(config.index.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.geocoder.fuzzy_threshold, 0.55);
        assert_eq!(config.geocoder.reverse_window, 0.001);
        assert!(!config.ingest.routable_only);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[index]\ncapacity = 8\n\n[ingest]\nroutable_only = true").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.index.capacity, 8);
        assert_eq!(config.index.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.geocoder, GeocoderConfig::default());
        assert!(config.ingest.routable_only);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[index]\ncapacity = \"lots\"").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());

        assert!(Config::load_from_file("/nonexistent/geodude.toml").is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = Config::load_or_default(None::<&Path>).unwrap();
        assert_eq!(config.index, IndexConfig::default());
    }
}
