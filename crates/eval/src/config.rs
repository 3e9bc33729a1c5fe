//! Evaluator configuration.

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Attempts a template constraint gets before the executor stops retrying.
pub const MAX_CONSTRAINT_ATTEMPTS: u32 = 100;

/// Settings for a [`crate::Processor`].
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Seed for the random source used by template randomization.
    pub seed: u64,
    /// Cap on template-constraint attempts per constraint.
    pub max_constraint_attempts: u32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            seed: 0,
            max_constraint_attempts: MAX_CONSTRAINT_ATTEMPTS,
        }
    }
}

impl EvalConfig {
    pub fn with_seed(seed: u64) -> Self {
        EvalConfig {
            seed,
            ..EvalConfig::default()
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, EvalError> {
        let config: EvalConfig =
            serde_json::from_value(json.clone()).map_err(|e| EvalError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.max_constraint_attempts == 0 {
            return Err(EvalError::InvalidConfig {
                message: "max_constraint_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
