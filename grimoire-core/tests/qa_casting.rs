//! QA tests for end-to-end casting through a session.
//!
//! These tests verify:
//! - Mana upcasting cost and resolution
//! - Slot casts always resolving at the tier ceiling
//! - Cantrips never touching resources
//! - Failed casts leaving the character untouched

use grimoire_core::casting::RiskLevel;
use grimoire_core::testing::{
    assert_hp, assert_resource, assert_resources_unchanged, sample_wizard, TestHarness,
};
use grimoire_core::{CastOptions, CastingError, Change, EngineConfig, MethodType, SessionError};

#[test]
fn test_mana_upcast_costs_one_per_tier() {
    let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![1]);

    let cost = harness
        .session
        .preview_cost("magic_missile", &CastOptions::mana().at_tier(3))
        .expect("magic missile should be castable with mana");
    assert_eq!(cost.description, "3 mana");

    let outcome = harness
        .cast("magic_missile", CastOptions::mana().at_tier(3))
        .unwrap();
    assert_eq!(outcome.effective_tier, 3);
    assert_resource(harness.character(), "mana", 11);
}

#[test]
fn test_slot_cast_upcasts_by_default() {
    let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![6]);

    let outcome = harness.cast("magic_missile", CastOptions::slot()).unwrap();

    assert_eq!(outcome.method, MethodType::Slot);
    assert_eq!(outcome.effective_tier, 3);
    // 3d4+3 + 2 x (1d4+1), every d4 showing 4
    assert_eq!(outcome.roll.unwrap().total, 25);
    assert_resource(harness.character(), "spell_slots", 3);
    assert_resource(harness.character(), "mana", 14);
}

#[test]
fn test_cantrips_are_free_either_way() {
    let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![10]);
    let before = harness.character().clone();

    for options in [CastOptions::mana(), CastOptions::slot()] {
        let outcome = harness.cast("fire_bolt", options).unwrap();
        assert_eq!(outcome.effective_tier, 0);
        // Level 5 adds one scaling die
        assert_eq!(outcome.roll.unwrap().total, 20);
    }

    assert_resources_unchanged(&before, harness.character());
}

#[test]
fn test_unaffordable_cast_changes_nothing() {
    let mut wizard = sample_wizard("Elara");
    wizard.set_resource_value("mana", 2).unwrap();
    let mut harness = TestHarness::new(wizard);
    let before = harness.character().clone();

    let cost = harness
        .session
        .preview_cost("fireball", &CastOptions::mana())
        .unwrap();
    assert!(!cost.can_afford);
    assert_eq!(cost.risk_level, RiskLevel::High);

    let err = harness.cast("fireball", CastOptions::mana()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Casting(CastingError::InsufficientResource { .. })
    ));
    assert_eq!(harness.character(), &before);
}

#[test]
fn test_action_shortfall_rolls_back_everything() {
    let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![3]);
    harness.session.start_encounter();

    // Three actions per turn, one per cast
    for _ in 0..3 {
        harness.cast("magic_missile", CastOptions::slot()).unwrap();
    }
    let before = harness.character().clone();

    let err = harness
        .cast("magic_missile", CastOptions::slot())
        .unwrap_err();
    assert!(err.to_string().contains("Not enough actions"));
    assert_eq!(harness.character(), &before);

    harness.session.new_turn();
    harness.cast("magic_missile", CastOptions::slot()).unwrap();
    assert_resource(harness.character(), "spell_slots", 0);
}

#[test]
fn test_feature_effects_flow_into_character() {
    let mut wizard = sample_wizard("Elara");
    wizard.set_resource_value("mana", 0).unwrap();
    let mut harness = TestHarness::new(wizard).with_rolls(vec![3]);

    let outcome = harness
        .cast("blood_price", CastOptions::mana())
        .unwrap();

    assert!(outcome.effect_results.iter().all(|r| r.success));
    assert!(outcome
        .changes
        .iter()
        .any(|c| matches!(c, Change::Damaged { amount: 3 })));
    assert_hp(harness.character(), 21, 24);
    assert_resource(harness.character(), "mana", 3);
}

#[test]
fn test_custom_resource_names() {
    let mut wizard = sample_wizard("Elara");
    wizard.resources.retain(|r| r.id != "spell_slots");
    wizard.resource_values.remove("spell_slots");
    let config = EngineConfig::default().with_slot_resource("mana");
    let mut harness = TestHarness::with_config(wizard, config);

    harness.cast("fireball", CastOptions::slot()).unwrap();
    assert_resource(harness.character(), "mana", 13);
}

#[test]
fn test_log_records_cast_sequence() {
    let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![2]);
    harness.cast("cure_wounds", CastOptions::mana()).unwrap();

    let summaries: Vec<String> = harness
        .session
        .log()
        .entries()
        .iter()
        .map(|e| e.entry.summary())
        .collect();
    assert_eq!(summaries.len(), 3);
    assert!(summaries[0].starts_with("Cure Wounds:"));
    assert_eq!(summaries[2], "Cast Cure Wounds at tier 1 via mana (1 mana)");
}
