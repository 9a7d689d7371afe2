//! Configuration management for schema-ir
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-ir.toml)
//! - Environment variables (SCHEMA_IR__*)
//!
//! ## Example config file (schema-ir.toml):
//! ```toml
//! [build]
//! max_depth = 128
//!
//! [parse]
//! builder_modules = ["zod", "zod/v4"]
//! ambient_identifier = "z"
//! allow_ambient_builder = true
//! require_descriptions = false
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrConfig {
    /// Structured-description builder settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Builder-syntax parser settings
    #[serde(default)]
    pub parse: ParseConfig,

    /// CLI output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Nesting ceiling for schema lowering
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Module specifiers whose imports bind builder identifiers
    #[serde(default = "default_builder_modules")]
    pub builder_modules: Vec<String>,

    /// Identifier accepted as a builder when a file imports no builder module
    #[serde(default = "default_ambient_identifier")]
    pub ambient_identifier: String,

    #[serde(default = "default_true")]
    pub allow_ambient_builder: bool,

    /// Emit `missing-description` advisories for exported declarations
    #[serde(default)]
    pub require_descriptions: bool,

    /// Nesting ceiling for chain lowering
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
/// Nesting ceiling shared by both front-ends and literal evaluation
pub const DEFAULT_MAX_DEPTH: usize = 128;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_true() -> bool {
    true
}

fn default_builder_modules() -> Vec<String> {
    vec!["zod".to_string(), "zod/v4".to_string()]
}

fn default_ambient_identifier() -> String {
    "z".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            builder_modules: default_builder_modules(),
            ambient_identifier: default_ambient_identifier(),
            allow_ambient_builder: true,
            require_descriptions: false,
            max_depth: default_max_depth(),
        }
    }
}

impl IrConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["schema-ir.toml", ".schema-ir.toml", "config/schema-ir.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-ir") {
            let xdg_config = config_dir.config_dir().join("schema-ir.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMA_IR__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_IR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
