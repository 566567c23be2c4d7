//! TOML configuration for the policy, the actuator and the agent loop.
//!
//! Every field is optional; omitted fields take the built-in values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    actuator::ActuatorConfig,
    policy::{ActionPlan, DecisionPolicy, PolicyError, Rule, standard_rules},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Rules in priority order, highest first.
    pub rules: Vec<Rule>,
    pub default_plan: ActionPlan,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rules: standard_rules(),
            default_plan: ActionPlan::SPRINT,
        }
    }
}

impl PolicyConfig {
    pub fn build(&self) -> Result<DecisionPolicy, PolicyError> {
        DecisionPolicy::new(self.rules.clone(), self.default_plan)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Consecutive frames without any known agent position before giving up.
    pub max_missing_frames: u32,
    /// Upper bound on decision cycles per episode.
    pub max_cycles: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_missing_frames: 30,
            max_cycles: 20_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub policy: PolicyConfig,
    pub actuator: ActuatorConfig,
    pub driver: DriverConfig,
}

impl AgentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(text)?;
        // surface bad rule tables at load time rather than on first use
        config.policy.build()?;
        Ok(config)
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
