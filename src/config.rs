//! TOML configuration: reasoning-service settings, workspace box and extra registry actions.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PlanError;
use crate::planner::RetryPolicy;
use crate::registry::{ActionRegistry, ParameterSlot, PrimitiveDescriptor, RegistryBuilder};
use crate::spatial::WorkspaceBounds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid action registry configuration: {0}")]
    Registry(#[from] PlanError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reasoning: ReasoningConfig,
    pub workspace: WorkspaceBounds,
    /// Actions added on top of the robot-arm defaults.
    pub actions: Vec<ActionConfig>,
}

/// Settings for the external reasoning-service call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry_attempts: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            retry_attempts: 3,
            backoff_min_ms: 4_000,
            backoff_max_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub required: Vec<ParameterSlot>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reasoning = &self.reasoning;

        if reasoning.model.trim().is_empty() {
            return Err(ConfigError::Invalid("reasoning.model is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&reasoning.temperature) {
            return Err(ConfigError::Invalid(format!(
                "reasoning.temperature must be within [0, 2], got {}",
                reasoning.temperature
            )));
        }
        if reasoning.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "reasoning.max_tokens must be positive".to_string(),
            ));
        }
        if reasoning.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reasoning.retry_attempts must be at least 1".to_string(),
            ));
        }
        if reasoning.backoff_min_ms > reasoning.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "reasoning.backoff_min_ms exceeds backoff_max_ms".to_string(),
            ));
        }

        for (axis, range) in [
            ("x", self.workspace.x),
            ("y", self.workspace.y),
            ("z", self.workspace.z),
        ] {
            if !range.is_ordered() {
                return Err(ConfigError::Invalid(format!(
                    "workspace.{axis} range is inverted: [{}, {}]",
                    range.min(),
                    range.max()
                )));
            }
        }

        Ok(())
    }

    /// Robot-arm defaults extended with the configured `[[actions]]`.
    pub fn registry(&self) -> Result<ActionRegistry, ConfigError> {
        let builder = self
            .actions
            .iter()
            .fold(RegistryBuilder::robot_arm(), |builder, action| {
                let descriptor = action
                    .required
                    .iter()
                    .fold(PrimitiveDescriptor::new(&action.target), |d, slot| {
                        d.requires(*slot)
                    });
                action.aliases.iter().fold(
                    builder.action_with(&action.name, descriptor),
                    |builder, alias| builder.alias(alias, &action.name),
                )
            });

        Ok(builder.build()?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.reasoning.retry_attempts,
            backoff_min: Duration::from_millis(self.reasoning.backoff_min_ms),
            backoff_max: Duration::from_millis(self.reasoning.backoff_max_ms),
        }
    }
}
