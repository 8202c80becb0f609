//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/devseed/devseed.toml`
//! 3. Local config: `<project_dir>/.devseed.toml`
//! 4. Environment variables: `DEVSEED_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::domain::Truthiness;
use crate::util::path::expand_env_vars;

pub const ENV_PREFIX: &str = "DEVSEED";

/// Raw settings for intermediate parsing; `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub seed_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub json_indent: Option<usize>,
    pub truthiness: Option<Truthiness>,
}

/// Unified configuration for devseed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Seed document, relative to the project directory (default: seed.yml)
    pub seed_file: PathBuf,
    /// Where generated files go, relative to the project directory (default: .devcontainer)
    pub output_dir: PathBuf,
    /// Indentation of devcontainer.json (default: 4)
    pub json_indent: usize,
    /// How `$if` conditions are read as booleans (default: lenient)
    pub truthiness: Truthiness,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed_file: PathBuf::from("seed.yml"),
            output_dir: PathBuf::from(".devcontainer"),
            json_indent: 4,
            truthiness: Truthiness::default(),
        }
    }
}

/// Get the XDG config directory for devseed.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "devseed").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("devseed.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".devseed.toml")
}

/// Environment source for `DEVSEED_*` overrides.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.seed_file = PathBuf::from(expand_env_vars(&self.seed_file.to_string_lossy()));
        self.output_dir = PathBuf::from(expand_env_vars(&self.output_dir.to_string_lossy()));
    }

    /// Overlay wins where it specifies a value.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            seed_file: overlay
                .seed_file
                .clone()
                .unwrap_or_else(|| self.seed_file.clone()),
            output_dir: overlay
                .output_dir
                .clone()
                .unwrap_or_else(|| self.output_dir.clone()),
            json_indent: overlay.json_indent.unwrap_or(self.json_indent),
            truthiness: overlay.truthiness.unwrap_or(self.truthiness),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory for local config
    #[instrument(level = "debug")]
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("Loading global config: {}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(project) = project_dir {
            let local_path = project_config_path(project);
            if local_path.exists() {
                debug!("Loading project config: {}", local_path.display());
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = current.apply_env_overrides(env_source())?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply `DEVSEED_*` variables from `env` as explicit overrides.
    pub fn apply_env_overrides(mut self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("seed_file") {
            self.seed_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("output_dir") {
            self.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("json_indent") {
            self.json_indent = val.trim().parse().map_err(|e| ApplicationError::Config {
                message: format!("{ENV_PREFIX}_JSON_INDENT '{val}': {e}"),
            })?;
        }
        if let Ok(val) = config.get_string("truthiness") {
            self.truthiness = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        Ok(self)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# devseed configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/devseed/devseed.toml
#   Project: <project_dir>/.devseed.toml
#   Env:     DEVSEED_* environment variables

# Seed document, relative to the project directory
# seed_file = "seed.yml"

# Output directory for devcontainer.json and docker-compose.yml
# output_dir = ".devcontainer"

# Indentation of devcontainer.json
# json_indent = 4

# How $if conditions are read:
#   "lenient": any non-empty value other than "false" is true; "", "false" and null are false
#   "strict":  only true / false are accepted, anything else is an error
# truthiness = "lenient"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
