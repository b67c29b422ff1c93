//! QA tests for saving and resuming characters.

use grimoire_core::persist::{save_path, SavedCharacter};
use grimoire_core::testing::{sample_wizard, SequenceRolls};
use grimoire_core::{CastOptions, CharacterSession, EngineConfig, Effect};

#[tokio::test]
async fn test_session_save_and_resume() {
    let dir = tempfile::tempdir().unwrap();
    let path = save_path(dir.path(), "Elara");

    let mut session = CharacterSession::new(sample_wizard("Elara"), EngineConfig::default());
    let mut rng = SequenceRolls::new(vec![4, 2]);
    session
        .cast("fireball", &CastOptions::mana().at_tier(3), &mut rng)
        .unwrap();
    session
        .apply_effects(&[Effect::dice_pool_change("fortune", "2")], "Lucky find", &mut rng)
        .unwrap();
    session.save(&path).await.unwrap();

    let resumed = CharacterSession::load(&path, EngineConfig::default())
        .await
        .unwrap();
    let original = session.current_character();
    let loaded = resumed.current_character();

    assert_eq!(loaded.resource_value("mana"), 11);
    assert_eq!(loaded.resource_values, original.resource_values);
    assert_eq!(loaded.dice_pool_values, original.dice_pool_values);
    assert_eq!(loaded.pool_dice("fortune").len(), 2);
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn test_peek_does_not_need_full_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = save_path(dir.path(), "Elara");
    SavedCharacter::new(sample_wizard("Elara"))
        .save_json(&path)
        .await
        .unwrap();

    let summary = SavedCharacter::peek_summary(&path).await.unwrap();
    assert_eq!(summary.character_name, "Elara");
    assert_eq!(summary.level, 5);
    assert_eq!(summary.hit_points, (24, 24));
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result =
        CharacterSession::load(dir.path().join("nobody.json"), EngineConfig::default()).await;
    assert!(result.is_err());
}
