// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generator configuration
//!
//! Stored as `shadergen.ron` next to the pipelines and graphs it lists:
//! - Pipeline definition files
//! - Graph documents
//! - Library include directories
//! - Output directory and file prefix for generated sources

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current configuration format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Configuration file read when none is given
pub const DEFAULT_CONFIG_FILE: &str = "shadergen.ron";

/// Error reading or writing a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Failed to access config {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid RON
    #[error("Invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Configuration could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Config version {0} is newer than supported version {CONFIG_FORMAT_VERSION}")]
    UnsupportedVersion(u32),
}

/// Generator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadergenConfig {
    /// Settings format version
    pub version: u32,
    /// Directory generated sources are written to
    pub generated_dir: PathBuf,
    /// Prefix of every generated file name
    pub file_prefix: String,
    /// Directories searched for library includes
    pub include_dirs: Vec<PathBuf>,
    /// Milliseconds between change checks in watch mode
    pub tick_interval_ms: u64,
    /// Pipeline definition files
    pub pipelines: Vec<PathBuf>,
    /// Graph documents
    pub graphs: Vec<PathBuf>,
}

impl Default for ShadergenConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            generated_dir: PathBuf::from("generated"),
            file_prefix: String::new(),
            include_dirs: Vec::new(),
            tick_interval_ms: 100,
            pipelines: Vec::new(),
            graphs: Vec::new(),
        }
    }
}

impl ShadergenConfig {
    /// Parse a configuration
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }

    /// Load a configuration file, making its paths relative to the file's directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&content)?;
        Ok(match path.parent() {
            Some(dir) => config.resolved(dir),
            None => config,
        })
    }

    /// Save a configuration file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Copy with every relative path joined onto `base`
    pub fn resolved(mut self, base: &Path) -> Self {
        let paths = std::iter::once(&mut self.generated_dir)
            .chain(&mut self.include_dirs)
            .chain(&mut self.pipelines)
            .chain(&mut self.graphs);
        for path in paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    /// Delay between change checks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ShadergenConfig::from_ron("(pipelines: [\"mesh.ron\"])").unwrap();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.generated_dir, PathBuf::from("generated"));
        assert_eq!(config.pipelines, vec![PathBuf::from("mesh.ron")]);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = ShadergenConfig::from_ron("(version: 99)");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = ShadergenConfig {
            graphs: vec![PathBuf::from("graphs/surface.ron")],
            include_dirs: vec![dir.path().join("shared")],
            ..ShadergenConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = ShadergenConfig::load(&path).unwrap();
        assert_eq!(loaded.graphs, vec![dir.path().join("graphs/surface.ron")]);
        assert_eq!(loaded.include_dirs, vec![dir.path().join("shared")]);
        assert_eq!(loaded.generated_dir, dir.path().join("generated"));
    }
}
