//! Walk a sample wizard through a few casts with real dice.

use grimoire_core::character::RestType;
use grimoire_core::dice::{roll, roll_with_advantage, thread_source};
use grimoire_core::testing::sample_wizard;
use grimoire_core::{CastOptions, CharacterSession, EngineConfig};

fn main() {
    println!("=== Dice ===\n");
    for (notation, description) in [
        ("1d20+5", "d20 with modifier"),
        ("4d6kh3", "4d6 keep highest 3"),
        ("8d6", "Fireball damage"),
    ] {
        match roll(notation) {
            Ok(result) => println!("{notation} ({description}): {result}"),
            Err(e) => println!("{notation}: {e}"),
        }
    }
    match roll_with_advantage("1d20", 1) {
        Ok(result) => println!("1d20 with advantage: {result}"),
        Err(e) => println!("1d20 with advantage: {e}"),
    }

    println!("\n=== Casting ===\n");
    let mut session = CharacterSession::new(sample_wizard("Elara"), EngineConfig::default());
    let mut rng = thread_source();

    let casts = [
        ("fire_bolt", CastOptions::mana()),
        ("magic_missile", CastOptions::mana().at_tier(2)),
        ("fireball", CastOptions::slot()),
        ("false_life", CastOptions::mana()),
        ("fireball", CastOptions::mana().at_tier(5)),
    ];
    for (ability_id, options) in casts {
        if let Some(cost) = session.preview_cost(ability_id, &options) {
            println!("{ability_id} via {}: {}", options.method, cost.description);
        }
        match session.cast(ability_id, &options, &mut rng) {
            Ok(outcome) => {
                if let Some(roll) = &outcome.roll {
                    println!("  tier {}: {roll}", outcome.effective_tier);
                }
            }
            Err(e) => println!("  failed: {e}"),
        }
    }

    let character = session.current_character();
    println!(
        "\nMana {}, slots {}, temp HP {}",
        character.resource_value("mana"),
        character.resource_value("spell_slots"),
        character.hit_points.temporary
    );

    let restored = session.rest(RestType::Long, &mut rng);
    println!("Long rest restored: {}", restored.join(", "));

    println!("\n=== Log ===\n");
    for entry in session.log().entries() {
        println!("- {}", entry.entry.summary());
    }
}
