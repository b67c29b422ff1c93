//! Typed ability effects and their resolution against a character.
//!
//! Every effect carries a dice formula. Resolution evaluates each formula
//! against a working copy of the character, so later effects observe the
//! results of earlier ones, and returns the accumulated [`Change`] patch for
//! the owner to apply.

use crate::character::{Change, Character};
use crate::dice::{DiceFormula, DiceRollResult, RollOptions, RollSource, Variables};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A side effect an ability applies to its caster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Damage, routed through temporary HP first.
    Damage { formula: String },
    Healing { formula: String },
    /// Replaces any existing temporary HP.
    TempHp { formula: String },
    /// Signed change to a resource, clamped to its bounds.
    ResourceChange { resource_id: String, formula: String },
    /// Signed change to a dice pool: positive rolls fresh dice, negative
    /// removes dice from the end.
    DicePoolChange { pool_id: String, formula: String },
}

impl Effect {
    pub fn damage(formula: impl Into<String>) -> Self {
        Effect::Damage {
            formula: formula.into(),
        }
    }

    pub fn healing(formula: impl Into<String>) -> Self {
        Effect::Healing {
            formula: formula.into(),
        }
    }

    pub fn temp_hp(formula: impl Into<String>) -> Self {
        Effect::TempHp {
            formula: formula.into(),
        }
    }

    pub fn resource_change(resource_id: impl Into<String>, formula: impl Into<String>) -> Self {
        Effect::ResourceChange {
            resource_id: resource_id.into(),
            formula: formula.into(),
        }
    }

    pub fn dice_pool_change(pool_id: impl Into<String>, formula: impl Into<String>) -> Self {
        Effect::DicePoolChange {
            pool_id: pool_id.into(),
            formula: formula.into(),
        }
    }

    pub fn formula(&self) -> &str {
        match self {
            Effect::Damage { formula }
            | Effect::Healing { formula }
            | Effect::TempHp { formula }
            | Effect::ResourceChange { formula, .. }
            | Effect::DicePoolChange { formula, .. } => formula,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Effect::Damage { .. } => "damage".to_string(),
            Effect::Healing { .. } => "healing".to_string(),
            Effect::TempHp { .. } => "temporary HP".to_string(),
            Effect::ResourceChange { resource_id, .. } => format!("{resource_id} change"),
            Effect::DicePoolChange { pool_id, .. } => format!("{pool_id} dice"),
        }
    }
}

/// Outcome of a single effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectResult {
    pub success: bool,
    pub value: Option<i32>,
    pub error: Option<String>,
}

impl EffectResult {
    pub fn applied(value: i32) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
        }
    }
}

/// Everything produced by resolving a list of effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectBatch {
    /// One result per input effect, in order.
    pub results: Vec<EffectResult>,
    /// Changes to apply to the owning character, in order.
    pub changes: Vec<Change>,
    pub rolls: Vec<DiceRollResult>,
}

impl EffectBatch {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EffectResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Resolve `effects` against `character` using only the character's own
/// formula variables.
pub fn apply_effects(
    character: &Character,
    effects: &[Effect],
    source: &str,
    rng: &mut dyn RollSource,
) -> EffectBatch {
    apply_effects_with(character, effects, &Variables::new(), source, rng)
}

/// Resolve `effects` with `extra` variables layered over the character's.
///
/// Each effect is evaluated independently; a failing effect is reported in
/// its result and does not stop its siblings.
pub fn apply_effects_with(
    character: &Character,
    effects: &[Effect],
    extra: &Variables,
    source: &str,
    rng: &mut dyn RollSource,
) -> EffectBatch {
    let mut working = character.clone();
    let mut batch = EffectBatch::default();

    for effect in effects {
        let result = resolve_effect(&mut working, effect, extra, rng, &mut batch);
        if let Some(error) = &result.error {
            warn!(source, effect = %effect.label(), error = %error, "Effect failed");
        } else {
            debug!(source, effect = %effect.label(), value = ?result.value, "Effect applied");
        }
        batch.results.push(result);
    }

    batch
}

fn resolve_effect(
    working: &mut Character,
    effect: &Effect,
    extra: &Variables,
    rng: &mut dyn RollSource,
    batch: &mut EffectBatch,
) -> EffectResult {
    if let Effect::DicePoolChange { pool_id, .. } = effect {
        if working.dice_pool(pool_id).is_none() {
            return EffectResult::failed(format!("Dice pool '{pool_id}' not found"));
        }
    }

    let mut variables = working.formula_variables();
    variables.merge(extra);

    let roll = match DiceFormula::parse(effect.formula())
        .and_then(|formula| formula.evaluate(&variables, &RollOptions::plain(), rng))
    {
        Ok(roll) => roll,
        Err(e) => return EffectResult::failed(e.to_string()),
    };
    let value = roll.total;
    batch.rolls.push(roll);

    let change = match effect {
        Effect::Damage { .. } => Some(Change::Damaged {
            amount: value.max(0),
        }),
        Effect::Healing { .. } => Some(Change::Healed {
            amount: value.max(0),
        }),
        Effect::TempHp { .. } => Some(Change::TempHpSet {
            value: value.max(0),
        }),
        Effect::ResourceChange { resource_id, .. } => {
            if working.has_resource(resource_id) {
                Some(Change::ResourceAdjusted {
                    resource_id: resource_id.clone(),
                    delta: value,
                })
            } else {
                debug!(resource_id, "Resource not tracked; change has no effect");
                None
            }
        }
        Effect::DicePoolChange { pool_id, .. } => pool_change(working, pool_id, value, rng),
    };

    if let Some(change) = change {
        if let Err(e) = working.apply_change(&change) {
            return EffectResult::failed(e.to_string());
        }
        batch.changes.push(change);
    }

    EffectResult::applied(value)
}

fn pool_change(
    working: &Character,
    pool_id: &str,
    delta: i32,
    rng: &mut dyn RollSource,
) -> Option<Change> {
    let pool = working.dice_pool(pool_id)?;
    let held = working.pool_dice(pool_id).len();

    if delta > 0 {
        let capacity = working.pool_capacity(pool_id).unwrap_or(0);
        let room = capacity.saturating_sub(held);
        let sides = pool.die_type.sides();
        let values: Vec<u32> = (0..(delta as usize).min(room))
            .map(|_| rng.roll_die(sides))
            .collect();
        (!values.is_empty()).then(|| Change::DiceAdded {
            pool_id: pool_id.to_string(),
            values,
        })
    } else if delta < 0 {
        let count = (delta.unsigned_abs() as usize).min(held);
        (count > 0).then(|| Change::DiceRemoved {
            pool_id: pool_id.to_string(),
            count,
        })
    } else {
        None
    }
}
