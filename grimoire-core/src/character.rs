//! Character sheet state consumed and mutated by the casting engine.
//!
//! Contains the character snapshot (attributes, hit points, resources, dice
//! pools, action economy, known abilities) and [`Change`], the patch type
//! through which all engine-driven mutation flows.

use crate::abilities::{AbilityDefinition, AbilityKind};
use crate::dice::{DiceError, DiceFormula, DieType, RollSource, Variables, MAX_DICE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Highest tier any character can unlock.
pub const MAX_TIER: u8 = 9;

/// Errors from the resource ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Resource '{0}' not found")]
    UnknownResource(String),

    #[error("Dice pool '{0}' not found")]
    UnknownDicePool(String),

    #[error("Not enough {resource_id}: requested {requested}, have {available}")]
    Insufficient {
        resource_id: String,
        requested: i32,
        available: i32,
    },

    #[error("Not enough actions: requires {required}, have {available}")]
    InsufficientActions { required: u32, available: u32 },

    #[error("Invalid bound for '{resource_id}': {source}")]
    Bound {
        resource_id: String,
        #[source]
        source: DiceError,
    },
}

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Attribute values keyed by abbreviation (`STR`, `DEX`, `INT`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    values: HashMap<String, i32>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, abbreviation: &str, value: i32) -> Self {
        self.set(abbreviation, value);
        self
    }

    pub fn get(&self, abbreviation: &str) -> i32 {
        self.values
            .get(&abbreviation.to_ascii_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, abbreviation: &str, value: i32) {
        self.values.insert(abbreviation.to_ascii_uppercase(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit points tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    /// Temporary HP absorbs first; current HP never drops below zero.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let amount = amount.max(0);
        let absorbed = self.temporary.min(amount);
        self.temporary -= absorbed;

        let remaining = amount - absorbed;
        let before = self.current;
        self.current = self.current.saturating_sub(remaining).max(0);

        DamageResult {
            absorbed_by_temporary: absorbed,
            damage_taken: before - self.current,
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = self.current.saturating_add(amount.max(0)).min(self.maximum);
        self.current - old
    }

    /// Temporary HP is replaced, never stacked.
    pub fn set_temp_hp(&mut self, amount: i32) {
        self.temporary = amount.max(0);
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }

    pub fn ratio(&self) -> f32 {
        if self.maximum <= 0 {
            return 0.0;
        }
        (self.current as f32 / self.maximum as f32).max(0.0)
    }
}

/// Result of taking damage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageResult {
    pub absorbed_by_temporary: i32,
    pub damage_taken: i32,
    pub dropped_to_zero: bool,
}

// ============================================================================
// Resources
// ============================================================================

/// A resource bound: either a fixed number or a formula over attributes.
///
/// Serialized untagged, so content can write `10` or `"5+INT"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceBound {
    Fixed(i32),
    Formula(String),
}

impl ResourceBound {
    pub fn resolve(&self, variables: &Variables) -> Result<i32, DiceError> {
        match self {
            ResourceBound::Fixed(value) => Ok(*value),
            ResourceBound::Formula(formula) => {
                DiceFormula::parse(formula)?.evaluate_static(variables)
            }
        }
    }
}

impl Default for ResourceBound {
    fn default() -> Self {
        ResourceBound::Fixed(0)
    }
}

/// When a resource or dice pool resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResetCondition {
    ShortRest,
    #[default]
    LongRest,
    EncounterEnd,
    Never,
}

/// What a resource resets to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResetType {
    #[default]
    ToMax,
    ToMin,
    ToDefault,
}

/// Kind of rest being taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestType {
    Short,
    Long,
}

impl RestType {
    /// Whether a resource with this reset condition recovers on this rest.
    /// A long rest also covers everything a short rest recovers.
    pub fn resets(&self, condition: ResetCondition) -> bool {
        match (self, condition) {
            (_, ResetCondition::Never) | (_, ResetCondition::EncounterEnd) => false,
            (RestType::Short, ResetCondition::ShortRest) => true,
            (RestType::Short, ResetCondition::LongRest) => false,
            (RestType::Long, _) => true,
        }
    }
}

/// A numeric resource pool such as mana or spell slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub min: ResourceBound,
    pub max: ResourceBound,
    #[serde(default)]
    pub reset_condition: ResetCondition,
    #[serde(default)]
    pub reset_type: ResetType,
    #[serde(default)]
    pub default_value: Option<i32>,
}

impl ResourceDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max: ResourceBound) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            min: ResourceBound::Fixed(0),
            max,
            reset_condition: ResetCondition::LongRest,
            reset_type: ResetType::ToMax,
            default_value: None,
        }
    }

    pub fn with_min(mut self, min: ResourceBound) -> Self {
        self.min = min;
        self
    }

    pub fn with_reset(mut self, condition: ResetCondition, reset_type: ResetType) -> Self {
        self.reset_condition = condition;
        self.reset_type = reset_type;
        self
    }

    pub fn with_default_value(mut self, value: i32) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A pool of individually rolled dice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePoolDefinition {
    pub id: String,
    pub name: String,
    pub die_type: DieType,
    pub max_dice: ResourceBound,
    #[serde(default)]
    pub reset_condition: ResetCondition,
    /// Refill to capacity on reset; otherwise the pool is emptied.
    #[serde(default)]
    pub refill_on_reset: bool,
}

impl DicePoolDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        die_type: DieType,
        max_dice: ResourceBound,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            die_type,
            max_dice,
            reset_condition: ResetCondition::LongRest,
            refill_on_reset: false,
        }
    }

    pub fn with_reset(mut self, condition: ResetCondition, refill: bool) -> Self {
        self.reset_condition = condition;
        self.refill_on_reset = refill;
        self
    }
}

// ============================================================================
// Action Economy
// ============================================================================

/// Per-turn action points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTracker {
    pub base: u32,
    pub bonus: u32,
    pub current: u32,
    pub in_encounter: bool,
}

impl ActionTracker {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            bonus: 0,
            current: base,
            in_encounter: false,
        }
    }

    pub fn per_turn(&self) -> u32 {
        self.base.saturating_add(self.bonus)
    }

    pub fn new_turn(&mut self) {
        self.current = self.per_turn();
    }
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new(3)
    }
}

// ============================================================================
// State Changes
// ============================================================================

/// A single state mutation produced by the engine.
///
/// Handlers and the effect resolver never touch the owning character; they
/// return a list of changes, which [`Character::apply_changes`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    /// Damage routed through temporary HP first.
    Damaged { amount: i32 },
    Healed { amount: i32 },
    TempHpSet { value: i32 },
    /// Strict spend: fails if the resource cannot cover it.
    ResourceSpent { resource_id: String, amount: i32 },
    /// Signed adjustment clamped to the resource bounds.
    ResourceAdjusted { resource_id: String, delta: i32 },
    DiceAdded { pool_id: String, values: Vec<u32> },
    DiceRemoved { pool_id: String, count: usize },
    ActionsSpent { amount: u32 },
}

impl Change {
    pub fn description(&self) -> String {
        match self {
            Change::Damaged { amount } => format!("took {amount} damage"),
            Change::Healed { amount } => format!("healed {amount} HP"),
            Change::TempHpSet { value } => format!("temporary HP set to {value}"),
            Change::ResourceSpent {
                resource_id,
                amount,
            } => format!("spent {amount} {resource_id}"),
            Change::ResourceAdjusted { resource_id, delta } => {
                if *delta >= 0 {
                    format!("restored {delta} {resource_id}")
                } else {
                    format!("lost {} {resource_id}", delta.unsigned_abs())
                }
            }
            Change::DiceAdded { pool_id, values } => {
                format!("added {} dice to {pool_id}", values.len())
            }
            Change::DiceRemoved { pool_id, count } => {
                format!("removed {count} dice from {pool_id}")
            }
            Change::ActionsSpent { amount } => {
                format!("spent {amount} action{}", if *amount == 1 { "" } else { "s" })
            }
        }
    }
}

// ============================================================================
// Character
// ============================================================================

/// The character snapshot the engine reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub level: u8,
    pub attributes: Attributes,
    pub hit_points: HitPoints,
    /// Highest ability tier unlocked (0–9).
    pub tier_access: u8,
    pub abilities: Vec<AbilityDefinition>,
    pub resources: Vec<ResourceDefinition>,
    pub resource_values: HashMap<String, i32>,
    pub dice_pools: Vec<DicePoolDefinition>,
    pub dice_pool_values: HashMap<String, Vec<u32>>,
    pub action_tracker: ActionTracker,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            level: 1,
            attributes: Attributes::new(),
            hit_points: HitPoints::new(10),
            tier_access: 0,
            abilities: Vec::new(),
            resources: Vec::new(),
            resource_values: HashMap::new(),
            dice_pools: Vec::new(),
            dice_pool_values: HashMap::new(),
            action_tracker: ActionTracker::default(),
        }
    }

    // ------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------

    pub fn abilities(&self) -> &[AbilityDefinition] {
        &self.abilities
    }

    pub fn learn_ability(&mut self, ability: AbilityDefinition) {
        self.abilities.retain(|a| a.id != ability.id);
        self.abilities.push(ability);
    }

    /// Find a known ability by id, optionally restricted to a kind.
    pub fn find_ability(&self, id: &str, kind: Option<AbilityKind>) -> Option<&AbilityDefinition> {
        self.abilities
            .iter()
            .find(|a| a.id == id && kind.map_or(true, |k| a.kind == k))
    }

    pub fn tier_access(&self) -> u8 {
        self.tier_access.min(MAX_TIER)
    }

    // ------------------------------------------------------------------
    // Formula variables
    // ------------------------------------------------------------------

    /// Variables for bound formulas: attributes and `LEVEL` only.
    pub fn attribute_variables(&self) -> Variables {
        let mut vars = Variables::new();
        for (name, value) in self.attributes.iter() {
            vars.set(name, value);
        }
        vars.set("LEVEL", self.level as i32);
        vars
    }

    /// Variables for dice formulas: attributes, `LEVEL`, `TIER` and the
    /// current value of every resource by id.
    pub fn formula_variables(&self) -> Variables {
        let mut vars = self.attribute_variables();
        vars.set("TIER", self.tier_access() as i32);
        for resource in &self.resources {
            vars.set(&resource.id, self.resource_value(&resource.id));
        }
        vars
    }

    // ------------------------------------------------------------------
    // Resource ledger
    // ------------------------------------------------------------------

    pub fn resource(&self, id: &str) -> Option<&ResourceDefinition> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn has_resource(&self, id: &str) -> bool {
        self.resource(id).is_some()
    }

    /// Register a resource, starting it at its maximum.
    pub fn add_resource(&mut self, definition: ResourceDefinition) -> Result<(), LedgerError> {
        let id = definition.id.clone();
        self.resources.retain(|r| r.id != id);
        self.resources.push(definition);
        let (_, max) = self.resource_bounds(&id)?;
        self.resource_values.insert(id, max);
        Ok(())
    }

    /// Current value; unknown resources read as zero.
    pub fn resource_value(&self, id: &str) -> i32 {
        self.resource_values.get(id).copied().unwrap_or(0)
    }

    /// Resolve (min, max) for a resource.
    pub fn resource_bounds(&self, id: &str) -> Result<(i32, i32), LedgerError> {
        let definition = self
            .resource(id)
            .ok_or_else(|| LedgerError::UnknownResource(id.to_string()))?;
        let vars = self.attribute_variables();
        let bound_error = |source| LedgerError::Bound {
            resource_id: id.to_string(),
            source,
        };
        let min = definition.min.resolve(&vars).map_err(bound_error)?;
        let max = definition.max.resolve(&vars).map_err(bound_error)?;
        Ok((min.min(max), max))
    }

    pub fn resource_max(&self, id: &str) -> Result<i32, LedgerError> {
        self.resource_bounds(id).map(|(_, max)| max)
    }

    /// Spend from a resource, rejecting amounts larger than the current value.
    pub fn spend_resource(&mut self, id: &str, amount: i32) -> Result<i32, LedgerError> {
        let (min, _) = self.resource_bounds(id)?;
        let current = self.resource_value(id);
        if amount > current {
            return Err(LedgerError::Insufficient {
                resource_id: id.to_string(),
                requested: amount,
                available: current,
            });
        }
        let next = current.saturating_sub(amount.max(0)).max(min);
        self.resource_values.insert(id.to_string(), next);
        Ok(next)
    }

    /// Restore a resource, clamped at its maximum.
    pub fn restore_resource(&mut self, id: &str, amount: i32) -> Result<i32, LedgerError> {
        self.adjust_resource(id, amount.max(0))
    }

    /// Signed adjustment clamped to the resource bounds.
    pub fn adjust_resource(&mut self, id: &str, delta: i32) -> Result<i32, LedgerError> {
        let (min, max) = self.resource_bounds(id)?;
        let next = self.resource_value(id).saturating_add(delta).clamp(min, max);
        self.resource_values.insert(id.to_string(), next);
        Ok(next)
    }

    pub fn set_resource_value(&mut self, id: &str, value: i32) -> Result<i32, LedgerError> {
        let (min, max) = self.resource_bounds(id)?;
        let next = value.clamp(min, max);
        self.resource_values.insert(id.to_string(), next);
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Dice pools
    // ------------------------------------------------------------------

    pub fn dice_pool(&self, id: &str) -> Option<&DicePoolDefinition> {
        self.dice_pools.iter().find(|p| p.id == id)
    }

    pub fn add_dice_pool(&mut self, definition: DicePoolDefinition) {
        let id = definition.id.clone();
        self.dice_pools.retain(|p| p.id != id);
        self.dice_pools.push(definition);
        self.dice_pool_values.entry(id).or_default();
    }

    pub fn pool_dice(&self, id: &str) -> &[u32] {
        self.dice_pool_values
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Capacity from `max_dice`, never more than [`MAX_DICE`].
    pub fn pool_capacity(&self, id: &str) -> Result<usize, LedgerError> {
        let pool = self
            .dice_pool(id)
            .ok_or_else(|| LedgerError::UnknownDicePool(id.to_string()))?;
        let max = pool
            .max_dice
            .resolve(&self.attribute_variables())
            .map_err(|source| LedgerError::Bound {
                resource_id: id.to_string(),
                source,
            })?;
        Ok(max.clamp(0, MAX_DICE as i32) as usize)
    }

    // ------------------------------------------------------------------
    // Action economy and encounters
    // ------------------------------------------------------------------

    pub fn update_action_tracker(&mut self, next: ActionTracker) {
        self.action_tracker = next;
    }

    pub fn start_encounter(&mut self) {
        self.action_tracker.in_encounter = true;
        self.action_tracker.new_turn();
    }

    pub fn new_turn(&mut self) {
        self.action_tracker.new_turn();
    }

    /// Leave the encounter and reset encounter-scoped resources and pools.
    pub fn end_encounter(&mut self, rng: &mut dyn RollSource) -> Vec<String> {
        self.action_tracker.in_encounter = false;
        self.action_tracker.new_turn();
        self.reset_matching(|condition| condition == ResetCondition::EncounterEnd, rng)
    }

    /// Take a rest, resetting matching resources and pools. A long rest
    /// also restores hit points and clears temporary HP.
    pub fn rest(&mut self, rest_type: RestType, rng: &mut dyn RollSource) -> Vec<String> {
        if rest_type == RestType::Long {
            self.hit_points.current = self.hit_points.maximum;
            self.hit_points.temporary = 0;
        }
        self.reset_matching(|condition| rest_type.resets(condition), rng)
    }

    fn reset_matching(
        &mut self,
        matches: impl Fn(ResetCondition) -> bool,
        rng: &mut dyn RollSource,
    ) -> Vec<String> {
        let mut restored = Vec::new();

        let resources: Vec<ResourceDefinition> = self
            .resources
            .iter()
            .filter(|r| matches(r.reset_condition))
            .cloned()
            .collect();
        for resource in resources {
            let Ok((min, max)) = self.resource_bounds(&resource.id) else {
                continue;
            };
            let value = match resource.reset_type {
                ResetType::ToMax => max,
                ResetType::ToMin => min,
                ResetType::ToDefault => resource.default_value.unwrap_or(max).clamp(min, max),
            };
            self.resource_values.insert(resource.id.clone(), value);
            restored.push(resource.name.clone());
        }

        let pools: Vec<DicePoolDefinition> = self
            .dice_pools
            .iter()
            .filter(|p| matches(p.reset_condition))
            .cloned()
            .collect();
        for pool in pools {
            let dice = if pool.refill_on_reset {
                let capacity = self.pool_capacity(&pool.id).unwrap_or(0);
                (0..capacity)
                    .map(|_| rng.roll_die(pool.die_type.sides()))
                    .collect()
            } else {
                Vec::new()
            };
            self.dice_pool_values.insert(pool.id.clone(), dice);
            restored.push(pool.name.clone());
        }

        debug!(character = %self.name, ?restored, "Reset resources");
        restored
    }

    // ------------------------------------------------------------------
    // Applying changes
    // ------------------------------------------------------------------

    /// Apply a single change in place.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), LedgerError> {
        match change {
            Change::Damaged { amount } => {
                self.hit_points.take_damage(*amount);
            }
            Change::Healed { amount } => {
                self.hit_points.heal(*amount);
            }
            Change::TempHpSet { value } => {
                self.hit_points.set_temp_hp(*value);
            }
            Change::ResourceSpent {
                resource_id,
                amount,
            } => {
                self.spend_resource(resource_id, *amount)?;
            }
            Change::ResourceAdjusted { resource_id, delta } => {
                self.adjust_resource(resource_id, *delta)?;
            }
            Change::DiceAdded { pool_id, values } => {
                let capacity = self.pool_capacity(pool_id)?;
                let dice = self.dice_pool_values.entry(pool_id.clone()).or_default();
                let room = capacity.saturating_sub(dice.len());
                dice.extend(values.iter().take(room));
            }
            Change::DiceRemoved { pool_id, count } => {
                if self.dice_pool(pool_id).is_none() {
                    return Err(LedgerError::UnknownDicePool(pool_id.clone()));
                }
                let dice = self.dice_pool_values.entry(pool_id.clone()).or_default();
                let keep = dice.len().saturating_sub(*count);
                dice.truncate(keep);
            }
            Change::ActionsSpent { amount } => {
                let available = self.action_tracker.current;
                if *amount > available {
                    return Err(LedgerError::InsufficientActions {
                        required: *amount,
                        available,
                    });
                }
                self.action_tracker.current -= amount;
            }
        }
        Ok(())
    }

    /// Apply a patch atomically: either every change lands or none do.
    pub fn apply_changes(&mut self, changes: &[Change]) -> Result<(), LedgerError> {
        let mut next = self.clone();
        for change in changes {
            next.apply_change(change)?;
        }
        *self = next;
        Ok(())
    }
}
