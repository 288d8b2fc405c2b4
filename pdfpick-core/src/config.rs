use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Multiplier applied per zoom-in step; zoom-out divides by it.
    pub zoom_step: f32,
    /// Render scale at 100 % zoom.
    pub base_resolution: f32,
    pub page_cache_capacity: usize,
    pub thumbnail_cache_capacity: usize,
    pub thumbnail_width: u32,
    pub jpeg_quality: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.1,
            max_zoom: 8.0,
            zoom_step: 1.25,
            base_resolution: 2.0,
            page_cache_capacity: 10,
            thumbnail_cache_capacity: 256,
            thumbnail_width: 150,
            jpeg_quality: 90,
        }
    }
}

impl EngineConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("net", "pdfpick", "pdfpick")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom > 0.0 && self.min_zoom.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "min_zoom must be positive, got {}",
                self.min_zoom
            )));
        }
        if !(self.max_zoom >= self.min_zoom && self.max_zoom.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "max_zoom ({}) must not be below min_zoom ({})",
                self.max_zoom, self.min_zoom
            )));
        }
        if !(self.zoom_step > 1.0 && self.zoom_step.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be greater than 1, got {}",
                self.zoom_step
            )));
        }
        if !(self.base_resolution > 0.0 && self.base_resolution.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "base_resolution must be positive, got {}",
                self.base_resolution
            )));
        }
        if self.page_cache_capacity == 0 || self.thumbnail_cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache capacities must be at least 1".to_owned(),
            ));
        }
        if self.thumbnail_width == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail_width must be at least 1".to_owned(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}
