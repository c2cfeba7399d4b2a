//! Configuration for the lexicon tooling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (lexicon.toml)
//! - Environment variables (LEXICON__*)
//!
//! ## Example config file (lexicon.toml):
//! ```toml
//! [registry]
//! paths = ["./lexicons"]
//!
//! [validation]
//! max_depth = 256
//! max_steps = 1000000
//!
//! [evolution]
//! strict = false
//! type_narrowing = true
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compatibility::CompatibilityChecker;
use crate::validator::{Validator, DEFAULT_MAX_DEPTH, DEFAULT_MAX_STEPS};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexiconConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Data validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Evolution check settings
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directories whose lexicons are available to `ref` resolution
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Data validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Nesting bound, counting each followed ref as one level
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Schema nodes visited per call before validation gives up
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

/// Evolution check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Any change at all is breaking
    #[serde(default)]
    pub strict: bool,

    /// A retained property changing its type tag is breaking
    #[serde(default = "default_true")]
    pub type_narrowing: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_true() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_steps: default_max_steps(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            type_narrowing: true,
        }
    }
}

impl LexiconConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["lexicon.toml", ".lexicon.toml", "config/lexicon.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "lexicon", "lexicon") {
            let xdg_config = config_dir.config_dir().join("lexicon.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // e.g. LEXICON__VALIDATION__MAX_DEPTH=64
        builder = builder.add_source(
            Environment::with_prefix("LEXICON")
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

    /// Data validator configured from `[validation]`
    pub fn validator(&self) -> Validator {
        Validator::new()
            .with_max_depth(self.validation.max_depth)
            .with_max_steps(self.validation.max_steps)
    }

    /// Evolution checker configured from `[evolution]`
    pub fn compatibility_checker(&self) -> CompatibilityChecker {
        let checker = CompatibilityChecker::new().with_type_narrowing(self.evolution.type_narrowing);
        if self.evolution.strict {
            checker.strict()
        } else {
            checker
        }
    }
}
