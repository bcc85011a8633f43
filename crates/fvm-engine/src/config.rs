//! VM configuration

use crate::gas::GasSchedule;
use crate::stack::DEFAULT_STACK_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for [`VmConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Parsed values are unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Limits and costs of a [`Vm`](crate::Vm)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Deepest nesting a frame may run at
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    /// Operand stack capacity
    #[serde(default = "default_max_stack_size")]
    pub max_stack_size: usize,
    /// Largest code CREATE may deploy
    #[serde(default = "default_max_code_size")]
    pub max_code_size: usize,
    /// Dynamic gas constants
    #[serde(default)]
    pub schedule: GasSchedule,
}

fn default_max_call_depth() -> usize {
    1024
}

fn default_max_stack_size() -> usize {
    DEFAULT_STACK_LIMIT
}

fn default_max_code_size() -> usize {
    24576
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: default_max_call_depth(),
            max_stack_size: default_max_stack_size(),
            max_code_size: default_max_code_size(),
            schedule: GasSchedule::default(),
        }
    }
}

impl VmConfig {
    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_size == 0 {
            return Err(ConfigError::Invalid("max_stack_size must be positive".into()));
        }
        if self.schedule.memory_quad_divisor == 0 {
            return Err(ConfigError::Invalid(
                "schedule.memory_quad_divisor must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Builder-style depth override
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
