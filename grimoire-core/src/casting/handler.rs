//! The casting method strategy and the pipeline every method shares.

use super::{
    CastOutcome, CastingContext, CastingCost, CastingError, CastingResult, MethodType,
    ResourceSpend,
};
use crate::character::{Change, Character};
use crate::dice::{DiceFormula, RollOptions, RollSource, Variables};
use crate::effects::apply_effects_with;
use crate::log::{ActivityEntry, LogEntry};
use tracing::{debug, warn};

/// A way of paying for and resolving an ability.
pub trait CastingMethodHandler: Send + Sync {
    fn method(&self) -> MethodType;

    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn is_available(&self, ctx: &CastingContext<'_>) -> bool;

    /// Explanation shown when [`is_available`](Self::is_available) is false.
    fn unavailable_reason(&self, ctx: &CastingContext<'_>) -> String {
        format!(
            "{} cannot be cast via {}",
            ctx.ability.name,
            self.display_name()
        )
    }

    /// Price the cast. Never mutates anything.
    fn calculate_cost(&self, ctx: &CastingContext<'_>) -> CastingCost;

    fn can_upcast(&self, ctx: &CastingContext<'_>) -> bool;

    /// Tier the ability resolves at when cast through this method.
    fn effective_tier(&self, ctx: &CastingContext<'_>) -> u8;

    fn cast(&self, ctx: &CastingContext<'_>, rng: &mut dyn RollSource) -> CastingResult {
        execute(self, ctx, rng)
    }
}

/// Run the shared cast pipeline for `handler`.
///
/// Gates in order: availability, affordability, action cost (only while in
/// an encounter), resource spend. Then the formula is rolled at the
/// effective tier and the ability's effects are resolved. All mutations are
/// staged on a working copy and returned as a patch, so a failed gate leaves
/// nothing to roll back.
pub fn execute<H: CastingMethodHandler + ?Sized>(
    handler: &H,
    ctx: &CastingContext<'_>,
    rng: &mut dyn RollSource,
) -> CastingResult {
    let ability = ctx.ability;
    let method = handler.method();

    if !handler.is_available(ctx) {
        return Err(CastingError::MethodUnavailable {
            method,
            reason: handler.unavailable_reason(ctx),
        });
    }

    let cost = handler.calculate_cost(ctx);
    if !cost.can_afford {
        let warning = cost
            .warning_message
            .unwrap_or_else(|| format!("Cannot afford {}", cost.description));
        warn!(ability = %ability.id, %method, %warning, "Cast rejected");
        return Err(CastingError::InsufficientResource { warning });
    }

    let mut working = ctx.character.clone();
    let mut changes = Vec::new();
    let mut log_entries = Vec::new();

    let tracker = working.action_tracker;
    if tracker.in_encounter && ability.action_cost > 0 {
        if tracker.current < ability.action_cost {
            return Err(CastingError::ActionShortfall {
                required: ability.action_cost,
                available: tracker.current,
            });
        }
        stage(
            &mut working,
            &mut changes,
            Change::ActionsSpent {
                amount: ability.action_cost,
            },
        )?;
    }

    let resource_spent: Option<ResourceSpend> =
        cost.resource_cost.filter(|spend| spend.amount > 0);
    if let Some(spend) = &resource_spent {
        stage(
            &mut working,
            &mut changes,
            Change::ResourceSpent {
                resource_id: spend.resource_id.clone(),
                amount: spend.amount,
            },
        )?;
        debug!(
            ability = %ability.id,
            resource = %spend.resource_id,
            amount = spend.amount,
            "Resource staged"
        );
    }

    let effective_tier = handler.effective_tier(ctx);

    let mut extra = Variables::new().with("TIER", effective_tier as i32);
    let roll = match ability.formula_at_tier(effective_tier, working.level) {
        Some(formula) => {
            let options = RollOptions {
                advantage_level: ctx.options.advantage_level,
                allow_criticals: ctx.config.allow_criticals,
                allow_fumbles: ctx.config.allow_fumbles,
            };
            let mut variables = working.formula_variables();
            variables.merge(&extra);
            let roll = DiceFormula::parse(&formula)?.evaluate(&variables, &options, rng)?;
            extra.set("ROLL", roll.total);
            log_entries.push(LogEntry::new(ActivityEntry::DiceRoll {
                label: ability.name.clone(),
                roll: roll.clone(),
            }));
            Some(roll)
        }
        None => None,
    };

    let mut effect_results = Vec::new();
    if !ability.effects.is_empty() {
        let batch = apply_effects_with(&working, &ability.effects, &extra, &ability.name, rng);
        let failed = batch.failures().count();
        if failed > 0 {
            warn!(ability = %ability.id, failed, "Some effects did not apply");
        }
        changes.extend(batch.changes);
        log_entries.push(LogEntry::new(ActivityEntry::EffectsApplied {
            source: ability.name.clone(),
            results: batch.results.clone(),
        }));
        effect_results = batch.results;
    }

    log_entries.push(LogEntry::new(ActivityEntry::SpellCast {
        ability_id: ability.id.clone(),
        ability_name: ability.name.clone(),
        method,
        tier: effective_tier,
        action_cost: ability.action_cost,
        resource_spent: resource_spent
            .as_ref()
            .map(|spend| (spend.resource_id.clone(), spend.amount)),
    }));

    debug!(
        ability = %ability.id,
        %method,
        tier = effective_tier,
        total = roll.as_ref().map(|r| r.total),
        "Cast resolved"
    );

    Ok(CastOutcome {
        ability_id: ability.id.clone(),
        method,
        effective_tier,
        resource_spent,
        roll,
        effect_results,
        changes,
        log_entries,
    })
}

fn stage(
    working: &mut Character,
    changes: &mut Vec<Change>,
    change: Change,
) -> Result<(), CastingError> {
    working.apply_change(&change)?;
    changes.push(change);
    Ok(())
}
