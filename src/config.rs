//! Configuration management for the flattener
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (flatten.toml)
//! - Environment variables (FLATTEN__*)
//!
//! ## Example config file (flatten.toml):
//! ```toml
//! [source]
//! base_dir = "./specs"
//!
//! [naming]
//! separator = "_"
//! first_suffix = 2
//!
//! [output]
//! format = "yaml"
//! pretty = true
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Main configuration for a flattening run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// Where external documents are read from
    #[serde(default)]
    pub source: SourceConfig,

    /// Local name allocation
    #[serde(default)]
    pub naming: NamingConfig,

    /// Output settings (CLI only)
    #[serde(default)]
    pub output: OutputConfig,
}

/// Document source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory relative references are resolved against.
    /// Defaults to the directory of the root document.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Placed between a colliding name and its counter
    #[serde(default = "default_separator")]
    pub separator: String,

    /// First counter tried on collision
    #[serde(default = "default_first_suffix")]
    pub first_suffix: u32,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_true")]
    pub pretty: bool,
}

/// Serialization format of the flattened document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

// Default value functions
fn default_separator() -> String {
    "_".to_string()
}

fn default_first_suffix() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            first_suffix: default_first_suffix(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            pretty: true,
        }
    }
}

impl FlattenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["flatten.toml", ".flatten.toml", "config/flatten.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "openapi-flatten") {
            let xdg_config = config_dir.config_dir().join("flatten.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (FLATTEN__*)
        builder = builder.add_source(
            Environment::with_prefix("FLATTEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Base directory for a root document: the configured one, else the
    /// document's own directory
    pub fn base_dir_for(&self, document: &Path) -> PathBuf {
        match &self.source.base_dir {
            Some(dir) => dir.clone(),
            None => document
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}
