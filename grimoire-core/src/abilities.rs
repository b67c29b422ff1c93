//! Ability definitions and the built-in ability catalog.
//!
//! Abilities are read-only input to the casting engine. The catalog holds
//! SRD-flavoured sample spells and features keyed by id.

use crate::effects::Effect;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Whether an ability is a spell or a class feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    Spell,
    Feature,
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbilityKind::Spell => write!(f, "spell"),
            AbilityKind::Feature => write!(f, "feature"),
        }
    }
}

/// The resource an ability draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceCost {
    Fixed {
        resource_id: String,
        amount: i32,
    },
    Variable {
        resource_id: String,
        min_amount: i32,
        max_amount: i32,
    },
}

impl ResourceCost {
    pub fn resource_id(&self) -> &str {
        match self {
            ResourceCost::Fixed { resource_id, .. } => resource_id,
            ResourceCost::Variable { resource_id, .. } => resource_id,
        }
    }
}

/// A castable spell or activatable feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: String,
    pub name: String,
    pub kind: AbilityKind,
    /// 0 is a cantrip.
    pub tier: u8,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_action_cost")]
    pub action_cost: u32,
    #[serde(default)]
    pub dice_formula: Option<String>,
    /// Added once per cantrip scaling threshold the caster has reached.
    #[serde(default)]
    pub scaling_bonus: Option<String>,
    /// Added once per tier cast above the base tier.
    #[serde(default)]
    pub upcast_bonus: Option<String>,
    #[serde(default)]
    pub resource_cost: Option<ResourceCost>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub description: String,
}

fn default_action_cost() -> u32 {
    1
}

/// Character levels at which cantrips gain another `scaling_bonus`.
pub const CANTRIP_SCALING_LEVELS: [u8; 3] = [5, 11, 17];

impl AbilityDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: AbilityKind,
        tier: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            tier,
            category: String::new(),
            action_cost: default_action_cost(),
            dice_formula: None,
            scaling_bonus: None,
            upcast_bonus: None,
            resource_cost: None,
            effects: Vec::new(),
            description: String::new(),
        }
    }

    pub fn spell(id: impl Into<String>, name: impl Into<String>, tier: u8) -> Self {
        Self::new(id, name, AbilityKind::Spell, tier)
    }

    pub fn feature(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, AbilityKind::Feature, 0)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_action_cost(mut self, action_cost: u32) -> Self {
        self.action_cost = action_cost;
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.dice_formula = Some(formula.into());
        self
    }

    pub fn with_scaling_bonus(mut self, bonus: impl Into<String>) -> Self {
        self.scaling_bonus = Some(bonus.into());
        self
    }

    pub fn with_upcast_bonus(mut self, bonus: impl Into<String>) -> Self {
        self.upcast_bonus = Some(bonus.into());
        self
    }

    pub fn with_fixed_cost(mut self, resource_id: impl Into<String>, amount: i32) -> Self {
        self.resource_cost = Some(ResourceCost::Fixed {
            resource_id: resource_id.into(),
            amount,
        });
        self
    }

    pub fn with_variable_cost(
        mut self,
        resource_id: impl Into<String>,
        min_amount: i32,
        max_amount: i32,
    ) -> Self {
        self.resource_cost = Some(ResourceCost::Variable {
            resource_id: resource_id.into(),
            min_amount,
            max_amount,
        });
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check if this is a cantrip.
    pub fn is_cantrip(&self) -> bool {
        self.tier == 0
    }

    /// Whether the ability draws from the given resource.
    pub fn costs_resource(&self, resource_id: &str) -> bool {
        self.resource_cost
            .as_ref()
            .is_some_and(|cost| cost.resource_id() == resource_id)
    }

    /// Number of cantrip scaling thresholds reached at `caster_level`.
    pub fn cantrip_steps(caster_level: u8) -> usize {
        CANTRIP_SCALING_LEVELS
            .iter()
            .filter(|&&threshold| caster_level >= threshold)
            .count()
    }

    /// The dice formula to roll when resolved at `effective_tier`.
    ///
    /// Appends `upcast_bonus` once per tier above the base tier and, for
    /// cantrips, `scaling_bonus` once per scaling threshold reached. A bonus
    /// of the form `NdM` is folded into a single term.
    pub fn formula_at_tier(&self, effective_tier: u8, caster_level: u8) -> Option<String> {
        let base = self.dice_formula.as_ref()?;
        let mut formula = base.clone();

        if let Some(bonus) = &self.upcast_bonus {
            let extra = effective_tier.saturating_sub(self.tier) as u32;
            append_bonus(&mut formula, bonus, extra);
        }

        if self.is_cantrip() {
            if let Some(bonus) = &self.scaling_bonus {
                append_bonus(&mut formula, bonus, Self::cantrip_steps(caster_level) as u32);
            }
        }

        Some(formula)
    }
}

fn append_bonus(formula: &mut String, bonus: &str, times: u32) {
    if times == 0 {
        return;
    }

    let bonus = bonus.trim();
    if let Some(d_pos) = bonus.to_ascii_lowercase().find('d') {
        let count = &bonus[..d_pos];
        let die = &bonus[d_pos..];
        let is_simple = die[1..].chars().all(|c| c.is_ascii_digit()) && !die[1..].is_empty();
        if is_simple {
            let count: u32 = if count.is_empty() {
                1
            } else {
                match count.parse() {
                    Ok(n) => n,
                    Err(_) => return append_repeated(formula, bonus, times),
                }
            };
            formula.push_str(&format!("+{}{}", count.saturating_mul(times), die));
            return;
        }
    }
    append_repeated(formula, bonus, times);
}

fn append_repeated(formula: &mut String, bonus: &str, times: u32) {
    for _ in 0..times {
        if bonus.starts_with('-') || bonus.starts_with('+') {
            formula.push_str(bonus);
        } else {
            formula.push('+');
            formula.push_str(bonus);
        }
    }
}

// ============================================================================
// Ability Catalog
// ============================================================================

lazy_static! {
    static ref CATALOG: HashMap<String, AbilityDefinition> = build_catalog();
}

/// Look up a catalog ability by id (case-insensitive).
pub fn get_ability(id: &str) -> Option<&'static AbilityDefinition> {
    CATALOG.get(&id.to_lowercase())
}

/// Get all abilities in the catalog.
pub fn all_abilities() -> impl Iterator<Item = &'static AbilityDefinition> {
    CATALOG.values()
}

/// Get all catalog abilities of a specific tier.
pub fn abilities_by_tier(tier: u8) -> impl Iterator<Item = &'static AbilityDefinition> {
    CATALOG.values().filter(move |a| a.tier == tier)
}

fn build_catalog() -> HashMap<String, AbilityDefinition> {
    let entries = vec![
        // Cantrips
        AbilityDefinition::spell("fire_bolt", "Fire Bolt", 0)
            .with_category("evocation")
            .with_formula("1d10")
            .with_scaling_bonus("1d10")
            .with_description("Hurl a mote of fire at a creature or object within range."),
        AbilityDefinition::spell("guidance", "Guidance", 0)
            .with_category("divination")
            .with_formula("1d4")
            .with_description("Add a d4 to one ability check of your choice."),
        // Tier 1
        AbilityDefinition::spell("magic_missile", "Magic Missile", 1)
            .with_category("evocation")
            .with_formula("3d4+3")
            .with_upcast_bonus("1d4+1")
            .with_fixed_cost("mana", 1)
            .with_description("Three glowing darts of magical force strike their targets."),
        AbilityDefinition::spell("cure_wounds", "Cure Wounds", 1)
            .with_category("abjuration")
            .with_formula("2d8+WIS")
            .with_upcast_bonus("2d8")
            .with_fixed_cost("mana", 1)
            .with_effect(Effect::healing("ROLL"))
            .with_description("A creature you touch regains hit points."),
        AbilityDefinition::spell("false_life", "False Life", 1)
            .with_category("necromancy")
            .with_formula("2d4+4")
            .with_upcast_bonus("5")
            .with_fixed_cost("mana", 1)
            .with_effect(Effect::temp_hp("ROLL"))
            .with_description("Bolster yourself with a necromantic facsimile of life."),
        // Tier 3
        AbilityDefinition::spell("fireball", "Fireball", 3)
            .with_category("evocation")
            .with_formula("8d6")
            .with_upcast_bonus("1d6")
            .with_fixed_cost("mana", 3)
            .with_description("A bright streak blossoms into an explosion of flame."),
        // Features
        AbilityDefinition::feature("arcane_recovery", "Arcane Recovery")
            .with_category("wizard")
            .with_action_cost(0)
            .with_effect(Effect::resource_change("mana", "1+INT"))
            .with_description("Recover some expended mana."),
        AbilityDefinition::feature("channel_fortune", "Channel Fortune")
            .with_category("wizard")
            .with_effect(Effect::dice_pool_change("fortune", "1"))
            .with_description("Gain a fortune die."),
        AbilityDefinition::feature("blood_price", "Blood Price")
            .with_category("warlock")
            .with_formula("1d4")
            .with_effect(Effect::damage("ROLL"))
            .with_effect(Effect::resource_change("mana", "ROLL"))
            .with_description("Convert your own vitality into mana."),
    ];

    entries
        .into_iter()
        .map(|ability| (ability.id.clone(), ability))
        .collect()
}
