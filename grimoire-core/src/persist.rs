//! Character persistence for save/load.
//!
//! Saves are versioned JSON. A small summary is stored alongside the full
//! character so save lists can be built without loading every file.

use crate::character::Character;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved character with everything needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCharacter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created, as unix seconds.
    pub saved_at: String,

    pub character: Character,

    pub summary: SaveSummary,
}

/// Quick-look information about a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub character_name: String,
    pub level: u8,
    pub tier_access: u8,
    pub hit_points: (i32, i32),
    #[serde(default)]
    pub saved_at: String,
}

impl SavedCharacter {
    pub fn new(character: Character) -> Self {
        let saved_at = unix_now();
        let summary = SaveSummary {
            character_name: character.name.clone(),
            level: character.level,
            tier_access: character.tier_access(),
            hit_points: (character.hit_points.current, character.hit_points.maximum),
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            character,
            summary,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(json)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = self.to_json()?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Read only the summary of a save file.
    pub async fn peek_summary(path: impl AsRef<Path>) -> Result<SaveSummary, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            summary: SaveSummary,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.summary)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// File name for a character's save in `base_dir`.
pub fn save_path(base_dir: impl AsRef<Path>, character_name: &str) -> PathBuf {
    let sanitized = character_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_wizard;

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/saves", "Elara the Wise");
        assert_eq!(path, PathBuf::from("/saves/Elara_the_Wise.json"));
    }

    #[test]
    fn test_json_round_trip() {
        let wizard = sample_wizard("Elara");
        let saved = SavedCharacter::new(wizard.clone());
        let json = saved.to_json().unwrap();

        let loaded = SavedCharacter::from_json(&json).unwrap();
        assert_eq!(loaded.character, wizard);
        assert_eq!(loaded.summary.character_name, "Elara");
    }

    #[test]
    fn test_version_mismatch() {
        let mut saved = SavedCharacter::new(sample_wizard("Elara"));
        saved.version = SAVE_VERSION + 1;
        let json = serde_json::to_string(&saved).unwrap();

        let err = SavedCharacter::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch { expected: 1, found: 2 }
        ));
    }

    #[tokio::test]
    async fn test_peek_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(dir.path(), "Elara");
        SavedCharacter::new(sample_wizard("Elara"))
            .save_json(&path)
            .await
            .unwrap();

        let summary = SavedCharacter::peek_summary(&path).await.unwrap();
        assert_eq!(summary.character_name, "Elara");
        assert_eq!(summary.tier_access, 3);
    }
}
