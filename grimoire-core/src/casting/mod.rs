//! Ability casting: method handlers and the dispatcher that routes to them.
//!
//! Handlers read an immutable [`Character`] snapshot and return a
//! [`CastOutcome`] whose `changes` the owner applies with
//! [`Character::apply_changes`]. Nothing here mutates the character.

pub mod dispatcher;
pub mod handler;
pub mod mana;
pub mod slot;

pub use dispatcher::{CastingDispatcher, HandlerRegistry};
pub use handler::CastingMethodHandler;
pub use mana::ManaHandler;
pub use slot::SlotHandler;

use crate::abilities::{AbilityDefinition, AbilityKind};
use crate::character::{Change, Character, LedgerError};
use crate::config::EngineConfig;
use crate::dice::{DiceError, DiceRollResult};
use crate::effects::EffectResult;
use crate::log::LogEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How an ability is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodType {
    Mana,
    Slot,
}

impl MethodType {
    pub fn all() -> [MethodType; 2] {
        [MethodType::Mana, MethodType::Slot]
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodType::Mana => write!(f, "mana"),
            MethodType::Slot => write!(f, "slot"),
        }
    }
}

/// Caller-supplied options for a cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastOptions {
    pub method: MethodType,
    /// Requested tier for upcasting. Defaults to the ability's own tier.
    pub target_tier: Option<u8>,
    pub advantage_level: i32,
    /// Restrict ability lookup to this kind.
    pub kind: Option<AbilityKind>,
}

impl CastOptions {
    pub fn new(method: MethodType) -> Self {
        Self {
            method,
            target_tier: None,
            advantage_level: 0,
            kind: None,
        }
    }

    pub fn mana() -> Self {
        Self::new(MethodType::Mana)
    }

    pub fn slot() -> Self {
        Self::new(MethodType::Slot)
    }

    pub fn at_tier(mut self, tier: u8) -> Self {
        self.target_tier = Some(tier);
        self
    }

    pub fn with_advantage(mut self, level: i32) -> Self {
        self.advantage_level = level;
        self
    }

    pub fn of_kind(mut self, kind: AbilityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Same options routed to another method.
    pub fn via(&self, method: MethodType) -> Self {
        Self {
            method,
            ..self.clone()
        }
    }
}

/// Everything a handler needs to judge and perform one cast.
#[derive(Debug, Clone, Copy)]
pub struct CastingContext<'a> {
    pub character: &'a Character,
    pub ability: &'a AbilityDefinition,
    pub options: &'a CastOptions,
    pub config: &'a EngineConfig,
}

impl<'a> CastingContext<'a> {
    pub fn new(
        character: &'a Character,
        ability: &'a AbilityDefinition,
        options: &'a CastOptions,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            character,
            ability,
            options,
            config,
        }
    }

    /// Requested tier, never below the ability's base tier.
    pub fn target_tier(&self) -> u8 {
        self.options
            .target_tier
            .unwrap_or(self.ability.tier)
            .max(self.ability.tier)
    }

    /// Highest tier this character may resolve at.
    pub fn tier_ceiling(&self) -> u8 {
        self.character.tier_access().min(self.config.max_tier)
    }
}

/// How close a cast leaves the character to running dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

/// A resource amount to be spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpend {
    pub resource_id: String,
    pub amount: i32,
}

/// The price of a cast, computed without touching state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastingCost {
    pub can_afford: bool,
    pub description: String,
    pub warning_message: Option<String>,
    pub risk_level: RiskLevel,
    /// `None` when the cast is free.
    pub resource_cost: Option<ResourceSpend>,
}

impl CastingCost {
    pub fn free(description: impl Into<String>) -> Self {
        Self {
            can_afford: true,
            description: description.into(),
            warning_message: None,
            risk_level: RiskLevel::None,
            resource_cost: None,
        }
    }

    /// Price a spend against the current and maximum pool values.
    pub fn priced(
        spend: ResourceSpend,
        description: impl Into<String>,
        available: i32,
        maximum: i32,
        shortfall_warning: impl FnOnce(i32, i32) -> String,
    ) -> Self {
        let can_afford = available >= spend.amount;
        let remaining = available - spend.amount;
        let risk_level = if !can_afford {
            RiskLevel::High
        } else if remaining == 0 {
            RiskLevel::Medium
        } else if remaining * 4 < maximum {
            RiskLevel::Low
        } else {
            RiskLevel::None
        };
        let warning_message = if can_afford {
            None
        } else {
            Some(shortfall_warning(spend.amount, available))
        };

        Self {
            can_afford,
            description: description.into(),
            warning_message,
            risk_level,
            resource_cost: Some(spend),
        }
    }
}

/// The consequences of a successful cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastOutcome {
    pub ability_id: String,
    pub method: MethodType,
    pub effective_tier: u8,
    pub resource_spent: Option<ResourceSpend>,
    pub roll: Option<DiceRollResult>,
    pub effect_results: Vec<EffectResult>,
    /// State patch for the owning character.
    pub changes: Vec<Change>,
    pub log_entries: Vec<LogEntry>,
}

/// Why a cast could not go ahead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastingError {
    #[error("Ability '{0}' not found")]
    NotFound(String),

    #[error("Casting method '{method}' is not available: {reason}")]
    MethodUnavailable { method: MethodType, reason: String },

    #[error("{warning}")]
    InsufficientResource { warning: String },

    #[error("Not enough actions: requires {required}, have {available}")]
    ActionShortfall { required: u32, available: u32 },

    #[error("Formula evaluation failed: {0}")]
    Evaluation(#[from] DiceError),

    #[error("Could not apply cast: {0}")]
    StateConflict(String),
}

impl From<LedgerError> for CastingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Insufficient { .. } => CastingError::InsufficientResource {
                warning: err.to_string(),
            },
            LedgerError::InsufficientActions {
                required,
                available,
            } => CastingError::ActionShortfall {
                required,
                available,
            },
            other => CastingError::StateConflict(other.to_string()),
        }
    }
}

pub type CastingResult = Result<CastOutcome, CastingError>;
