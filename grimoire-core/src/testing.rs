//! Testing utilities for the casting engine.
//!
//! This module provides tools for deterministic tests:
//! - `SequenceRolls` and `MaxRolls` as scripted dice
//! - Sample characters with resources, pools and known abilities
//! - `TestHarness` for scripted cast scenarios
//! - Assertion helpers for verifying character state

use crate::abilities::get_ability;
use crate::casting::{CastOptions, CastOutcome};
use crate::character::{
    ActionTracker, Attributes, Character, DicePoolDefinition, HitPoints, ResetCondition,
    ResetType, ResourceBound, ResourceDefinition,
};
use crate::config::EngineConfig;
use crate::dice::{DieType, RollSource};
use crate::session::{CharacterSession, SessionError};

/// Dice that return scripted values in order, cycling when exhausted.
///
/// Each value is clamped to the die being rolled. An empty script always
/// rolls 1.
#[derive(Debug, Clone)]
pub struct SequenceRolls {
    values: Vec<u32>,
    index: usize,
}

impl SequenceRolls {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }

    /// Number of dice rolled so far.
    pub fn rolled(&self) -> usize {
        self.index
    }
}

impl RollSource for SequenceRolls {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if self.values.is_empty() {
            return 1;
        }
        let value = self.values[self.index % self.values.len()];
        self.index += 1;
        value.clamp(1, sides.max(1))
    }
}

/// Dice that always show their highest face.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxRolls;

impl RollSource for MaxRolls {
    fn roll_die(&mut self, sides: u32) -> u32 {
        sides.max(1)
    }
}

/// A level 5 wizard with mana, spell slots and a fortune dice pool.
///
/// INT 4, WIS 1, 24 HP, tier access 3. Mana is `10+INT` (14), four spell
/// slots, and up to three d6 fortune dice.
pub fn sample_wizard(name: &str) -> Character {
    let mut character = Character::new(name);
    character.level = 5;
    character.attributes = Attributes::new()
        .with("STR", -1)
        .with("DEX", 2)
        .with("CON", 1)
        .with("INT", 4)
        .with("WIS", 1)
        .with("CHA", 0);
    character.hit_points = HitPoints::new(24);
    character.tier_access = 3;
    character.update_action_tracker(ActionTracker::new(3));

    let resources = [
        ResourceDefinition::new("mana", "Mana", ResourceBound::Formula("10+INT".to_string())),
        ResourceDefinition::new("spell_slots", "Spell Slots", ResourceBound::Fixed(4)),
        ResourceDefinition::new("ward", "Arcane Ward", ResourceBound::Fixed(10))
            .with_reset(ResetCondition::EncounterEnd, ResetType::ToDefault)
            .with_default_value(5),
    ];
    for resource in resources {
        // Sample definitions only use variables the wizard has.
        if let Err(e) = character.add_resource(resource) {
            panic!("sample resource rejected: {e}");
        }
    }

    character.add_dice_pool(DicePoolDefinition::new(
        "fortune",
        "Fortune Dice",
        DieType::D6,
        ResourceBound::Fixed(3),
    ));

    for id in [
        "fire_bolt",
        "magic_missile",
        "cure_wounds",
        "false_life",
        "fireball",
        "arcane_recovery",
        "channel_fortune",
        "blood_price",
    ] {
        if let Some(ability) = get_ability(id) {
            character.learn_ability(ability.clone());
        }
    }

    character
}

/// A level 3 fighter with no spellcasting resources.
///
/// Knows only the `fire_bolt` cantrip; tier access 0.
pub fn sample_fighter(name: &str) -> Character {
    let mut character = Character::new(name);
    character.level = 3;
    character.attributes = Attributes::new()
        .with("STR", 3)
        .with("DEX", 1)
        .with("CON", 2)
        .with("INT", 0)
        .with("WIS", 1)
        .with("CHA", -1);
    character.hit_points = HitPoints::new(28);
    character.tier_access = 0;
    if let Some(ability) = get_ability("fire_bolt") {
        character.learn_ability(ability.clone());
    }
    character
}

/// A scripted scenario around a [`CharacterSession`].
pub struct TestHarness {
    pub session: CharacterSession,
    pub rolls: SequenceRolls,
}

impl TestHarness {
    pub fn new(character: Character) -> Self {
        Self::with_config(character, EngineConfig::default())
    }

    pub fn with_config(character: Character, config: EngineConfig) -> Self {
        Self {
            session: CharacterSession::new(character, config),
            rolls: SequenceRolls::new(vec![1]),
        }
    }

    /// Script the dice for subsequent casts.
    pub fn with_rolls(mut self, values: Vec<u32>) -> Self {
        self.rolls = SequenceRolls::new(values);
        self
    }

    pub fn cast(
        &mut self,
        ability_id: &str,
        options: CastOptions,
    ) -> Result<CastOutcome, SessionError> {
        self.session.cast(ability_id, &options, &mut self.rolls)
    }

    pub fn character(&self) -> &Character {
        self.session.current_character()
    }

    pub fn resource(&self, id: &str) -> i32 {
        self.character().resource_value(id)
    }

    pub fn hp(&self) -> (i32, i32) {
        let hp = &self.character().hit_points;
        (hp.current, hp.maximum)
    }
}

/// Assert that every resource value and dice pool matches between two
/// snapshots.
#[track_caller]
pub fn assert_resources_unchanged(before: &Character, after: &Character) {
    assert_eq!(
        before.resource_values, after.resource_values,
        "Expected resource values to be unchanged"
    );
    assert_eq!(
        before.dice_pool_values, after.dice_pool_values,
        "Expected dice pools to be unchanged"
    );
}

/// Assert a resource's current value.
#[track_caller]
pub fn assert_resource(character: &Character, id: &str, expected: i32) {
    let actual = character.resource_value(id);
    assert_eq!(
        actual, expected,
        "Expected {id} to be {expected}, got {actual}"
    );
}

/// Assert current and maximum hit points.
#[track_caller]
pub fn assert_hp(character: &Character, current: i32, max: i32) {
    let actual = (character.hit_points.current, character.hit_points.maximum);
    assert_eq!(
        actual,
        (current, max),
        "Expected HP {current}/{max}, got {}/{}",
        actual.0,
        actual.1
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_rolls_cycle_and_clamp() {
        let mut rolls = SequenceRolls::new(vec![3, 9]);
        assert_eq!(rolls.roll_die(6), 3);
        assert_eq!(rolls.roll_die(6), 6);
        assert_eq!(rolls.roll_die(20), 3);
        assert_eq!(rolls.rolled(), 3);

        let mut empty = SequenceRolls::new(vec![]);
        assert_eq!(empty.roll_die(20), 1);
    }

    #[test]
    fn test_sample_wizard() {
        let wizard = sample_wizard("Elara");
        assert_resource(&wizard, "mana", 14);
        assert_resource(&wizard, "spell_slots", 4);
        assert_hp(&wizard, 24, 24);
        assert!(wizard.find_ability("fireball", None).is_some());
        assert_eq!(wizard.pool_capacity("fortune"), Ok(3));
    }

    #[test]
    fn test_harness_scripted_cast() {
        let mut harness = TestHarness::new(sample_wizard("Elara")).with_rolls(vec![4]);
        let outcome = harness.cast("false_life", CastOptions::mana()).unwrap();

        // 2d4+4 with both dice showing 4
        assert_eq!(outcome.roll.unwrap().total, 12);
        assert_eq!(harness.character().hit_points.temporary, 12);
        assert_eq!(harness.resource("mana"), 13);
        assert_eq!(harness.hp(), (24, 24));
    }
}
