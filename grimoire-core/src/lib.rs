//! Tabletop RPG ability casting engine.
//!
//! This crate provides:
//! - Dice formula evaluation with variables, keep modifiers and advantage
//! - Mana and slot casting methods behind a pluggable handler registry
//! - Typed effects (damage, healing, temporary HP, resources, dice pools)
//! - A resource ledger with rests, encounters and action economy
//! - Character persistence
//!
//! The engine never mutates a character directly. Casting reads a snapshot
//! and returns a patch of [`Change`]s; [`CharacterSession`] applies it.
//!
//! # Quick Start
//!
//! ```ignore
//! use grimoire_core::{CastOptions, CharacterSession, EngineConfig};
//! use grimoire_core::dice::thread_source;
//!
//! let mut session = CharacterSession::new(character, EngineConfig::default());
//! let outcome = session.cast("fireball", &CastOptions::mana().at_tier(4), &mut thread_source())?;
//! println!("{}", outcome.roll.unwrap());
//! ```

pub mod abilities;
pub mod casting;
pub mod character;
pub mod config;
pub mod dice;
pub mod effects;
pub mod log;
pub mod persist;
pub mod session;
pub mod testing;

pub use abilities::{AbilityDefinition, AbilityKind, ResourceCost};
pub use casting::{
    CastOptions, CastOutcome, CastingCost, CastingDispatcher, CastingError, CastingResult,
    HandlerRegistry, MethodType, RiskLevel,
};
pub use character::{Change, Character, CharacterId, LedgerError, RestType};
pub use config::EngineConfig;
pub use dice::{DiceError, DiceRollResult, RollSource};
pub use effects::{Effect, EffectResult};
pub use session::{CharacterSession, SessionError, SharedCharacter};
pub use testing::{SequenceRolls, TestHarness};
