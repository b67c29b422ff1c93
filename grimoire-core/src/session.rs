//! The active character slot.
//!
//! [`CharacterSession`] owns one character and is the only place engine
//! patches are applied. [`SharedCharacter`] puts a session behind an async
//! mutex for hosts that share it across tasks.

use crate::casting::{
    CastOptions, CastOutcome, CastingCost, CastingDispatcher, CastingError, HandlerRegistry,
    MethodType,
};
use crate::character::{Character, LedgerError, RestType};
use crate::config::EngineConfig;
use crate::dice::RollSource;
use crate::effects::{apply_effects, Effect, EffectBatch};
use crate::log::{ActivityEntry, ActivityLog, LogEntry, MemoryLog};
use crate::persist::{PersistError, SavedCharacter};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// Errors that can occur in a character session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Casting error: {0}")]
    Casting(#[from] CastingError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// An active character plus the engine that acts on it.
#[derive(Debug)]
pub struct CharacterSession {
    character: Character,
    dispatcher: CastingDispatcher,
    log: MemoryLog,
}

impl CharacterSession {
    /// Start a session with the default handlers.
    pub fn new(character: Character, config: EngineConfig) -> Self {
        Self::with_dispatcher(
            character,
            CastingDispatcher::new(HandlerRegistry::with_defaults(), config),
        )
    }

    pub fn with_dispatcher(character: Character, dispatcher: CastingDispatcher) -> Self {
        Self {
            character,
            dispatcher,
            log: MemoryLog::new(),
        }
    }

    pub fn current_character(&self) -> &Character {
        &self.character
    }

    /// Swap in a different character. The log is kept.
    pub fn replace_character(&mut self, character: Character) -> Character {
        std::mem::replace(&mut self.character, character)
    }

    pub fn dispatcher(&self) -> &CastingDispatcher {
        &self.dispatcher
    }

    pub fn log(&self) -> &MemoryLog {
        &self.log
    }

    /// Cast an ability and commit its consequences.
    ///
    /// On any error the character is left exactly as it was.
    pub fn cast(
        &mut self,
        ability_id: &str,
        options: &CastOptions,
        rng: &mut dyn RollSource,
    ) -> Result<CastOutcome, SessionError> {
        let outcome = self
            .dispatcher
            .cast_ability(&self.character, ability_id, options, rng)?;
        self.character
            .apply_changes(&outcome.changes)
            .map_err(CastingError::from)?;

        for entry in &outcome.log_entries {
            self.log.add_log_entry(entry.clone());
        }
        Ok(outcome)
    }

    pub fn preview_cost(&self, ability_id: &str, options: &CastOptions) -> Option<CastingCost> {
        self.dispatcher
            .calculate_cost(&self.character, ability_id, options)
    }

    pub fn available_methods(
        &self,
        ability_id: &str,
        options: Option<&CastOptions>,
    ) -> Vec<MethodType> {
        self.dispatcher
            .available_methods(&self.character, ability_id, options)
    }

    pub fn can_upcast(&self, ability_id: &str, options: &CastOptions) -> bool {
        self.dispatcher
            .can_upcast(&self.character, ability_id, options)
    }

    /// Resolve effects from outside a cast (traps, potions, DM fiat).
    pub fn apply_effects(
        &mut self,
        effects: &[Effect],
        source: &str,
        rng: &mut dyn RollSource,
    ) -> Result<EffectBatch, SessionError> {
        let batch = apply_effects(&self.character, effects, source, rng);
        self.character.apply_changes(&batch.changes)?;
        self.log.add_log_entry(LogEntry::new(ActivityEntry::EffectsApplied {
            source: source.to_string(),
            results: batch.results.clone(),
        }));
        Ok(batch)
    }

    pub fn rest(&mut self, rest_type: RestType, rng: &mut dyn RollSource) -> Vec<String> {
        let restored = self.character.rest(rest_type, rng);
        info!(character = %self.character.name, ?rest_type, "Rested");
        self.log.add_log_entry(LogEntry::new(ActivityEntry::Rest {
            rest_type,
            restored: restored.clone(),
        }));
        restored
    }

    pub fn start_encounter(&mut self) {
        self.character.start_encounter();
    }

    pub fn new_turn(&mut self) {
        self.character.new_turn();
    }

    pub fn end_encounter(&mut self, rng: &mut dyn RollSource) -> Vec<String> {
        self.character.end_encounter(rng)
    }

    /// Save the current character.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        SavedCharacter::new(self.character.clone())
            .save_json(path)
            .await?;
        Ok(())
    }

    /// Resume a session from a save file.
    pub async fn load(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, SessionError> {
        let saved = SavedCharacter::load_json(path).await?;
        Ok(Self::new(saved.character, config))
    }
}

/// A session shared between tasks.
///
/// The lock is held from cost check to patch application, so two
/// concurrent casts cannot both spend the same resource.
#[derive(Debug, Clone)]
pub struct SharedCharacter {
    inner: Arc<Mutex<CharacterSession>>,
}

impl SharedCharacter {
    pub fn new(session: CharacterSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, CharacterSession> {
        self.inner.lock().await
    }

    pub async fn cast(
        &self,
        ability_id: &str,
        options: &CastOptions,
        rng: &mut (dyn RollSource + Send),
    ) -> Result<CastOutcome, SessionError> {
        self.inner.lock().await.cast(ability_id, options, rng)
    }

    /// A copy of the character as it is right now.
    pub async fn snapshot(&self) -> Character {
        self.inner.lock().await.current_character().clone()
    }
}
