//! Engine configuration.

use crate::casting::MethodType;
use crate::character::MAX_TIER;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the casting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resource consumed by mana casting.
    pub mana_resource_id: String,

    /// Resource consumed by slot casting.
    pub slot_resource_id: String,

    /// Highest tier any cast can resolve at.
    pub max_tier: u8,

    /// Count natural maximum rolls as criticals.
    pub allow_criticals: bool,

    /// Flag a natural 1 on a single d20 as a fumble.
    pub allow_fumbles: bool,

    /// Method used when the caller does not pick one.
    pub default_method: MethodType,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mana_resource_id: "mana".to_string(),
            slot_resource_id: "spell_slots".to_string(),
            max_tier: MAX_TIER,
            allow_criticals: true,
            allow_fumbles: true,
            default_method: MethodType::Slot,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mana resource id.
    pub fn with_mana_resource(mut self, id: impl Into<String>) -> Self {
        self.mana_resource_id = id.into();
        self
    }

    /// Set the slot resource id.
    pub fn with_slot_resource(mut self, id: impl Into<String>) -> Self {
        self.slot_resource_id = id.into();
        self
    }

    pub fn with_max_tier(mut self, tier: u8) -> Self {
        self.max_tier = tier;
        self
    }

    pub fn with_criticals(mut self, allow: bool) -> Self {
        self.allow_criticals = allow;
        self
    }

    pub fn with_fumbles(mut self, allow: bool) -> Self {
        self.allow_fumbles = allow;
        self
    }

    pub fn with_default_method(mut self, method: MethodType) -> Self {
        self.default_method = method;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mana_resource_id.trim().is_empty() {
            return Err(ConfigError::Invalid("mana_resource_id is empty".to_string()));
        }
        if self.slot_resource_id.trim().is_empty() {
            return Err(ConfigError::Invalid("slot_resource_id is empty".to_string()));
        }
        if self.max_tier > MAX_TIER {
            return Err(ConfigError::Invalid(format!(
                "max_tier {} exceeds {MAX_TIER}",
                self.max_tier
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }
}
