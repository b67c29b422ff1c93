//! Slot casting: one slot per cast, always resolved at the caster's highest
//! unlocked tier.

use super::{CastingContext, CastingCost, CastingMethodHandler, MethodType, ResourceSpend};

/// Casts abilities by spending a single slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotHandler;

impl SlotHandler {
    pub fn new() -> Self {
        Self
    }
}

impl CastingMethodHandler for SlotHandler {
    fn method(&self) -> MethodType {
        MethodType::Slot
    }

    fn display_name(&self) -> &'static str {
        "Spell Slot"
    }

    fn description(&self) -> &'static str {
        "Spend one slot; the ability resolves at your highest unlocked tier"
    }

    fn is_available(&self, ctx: &CastingContext<'_>) -> bool {
        if ctx.ability.tier > ctx.tier_ceiling() {
            return false;
        }
        ctx.ability.is_cantrip() || ctx.character.has_resource(&ctx.config.slot_resource_id)
    }

    fn unavailable_reason(&self, ctx: &CastingContext<'_>) -> String {
        if ctx.ability.tier > ctx.tier_ceiling() {
            format!(
                "tier {} exceeds tier access {}",
                ctx.ability.tier,
                ctx.tier_ceiling()
            )
        } else {
            format!("{} has no {}", ctx.character.name, ctx.config.slot_resource_id)
        }
    }

    fn calculate_cost(&self, ctx: &CastingContext<'_>) -> CastingCost {
        if ctx.ability.is_cantrip() {
            return CastingCost::free("Free (cantrip)");
        }

        let resource_id = &ctx.config.slot_resource_id;
        let available = ctx.character.resource_value(resource_id);
        let maximum = ctx.character.resource_max(resource_id).unwrap_or(0);

        CastingCost::priced(
            ResourceSpend {
                resource_id: resource_id.clone(),
                amount: 1,
            },
            "1 spell slot",
            available,
            maximum,
            |_, _| "No spell slots remaining".to_string(),
        )
    }

    fn can_upcast(&self, ctx: &CastingContext<'_>) -> bool {
        !ctx.ability.is_cantrip() && ctx.ability.tier < ctx.tier_ceiling()
    }

    /// Upcast by default: every levelled cast lands at the tier ceiling.
    fn effective_tier(&self, ctx: &CastingContext<'_>) -> u8 {
        if ctx.ability.is_cantrip() {
            0
        } else {
            ctx.tier_ceiling()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::get_ability;
    use crate::casting::{CastOptions, CastingError};
    use crate::character::{Change, MAX_TIER};
    use crate::config::EngineConfig;
    use crate::testing::{sample_fighter, sample_wizard, SequenceRolls};

    #[test]
    fn test_resolves_at_tier_ceiling() {
        let mut wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::slot();

        for access in [1u8, 3, 9, 12] {
            wizard.tier_access = access;
            let ctx = CastingContext::new(&wizard, missile, &options, &config);
            let mut rng = SequenceRolls::new(vec![1]);
            let outcome = SlotHandler.cast(&ctx, &mut rng).unwrap();
            assert_eq!(outcome.effective_tier, access.min(MAX_TIER));
        }
    }

    #[test]
    fn test_cost_is_flat() {
        let mut wizard = sample_wizard("Elara");
        wizard.tier_access = 9;
        let config = EngineConfig::default();
        let fireball = get_ability("fireball").unwrap();
        let options = CastOptions::slot().at_tier(7);
        let ctx = CastingContext::new(&wizard, fireball, &options, &config);

        let cost = SlotHandler.calculate_cost(&ctx);
        assert_eq!(cost.description, "1 spell slot");
        assert_eq!(cost.resource_cost.unwrap().amount, 1);
    }

    #[test]
    fn test_cantrip_needs_no_slots() {
        let fighter = sample_fighter("Brom");
        let config = EngineConfig::default();
        let fire_bolt = get_ability("fire_bolt").unwrap();
        let options = CastOptions::slot();
        let ctx = CastingContext::new(&fighter, fire_bolt, &options, &config);

        assert!(SlotHandler.is_available(&ctx));
        let mut rng = SequenceRolls::new(vec![4]);
        let outcome = SlotHandler.cast(&ctx, &mut rng).unwrap();
        assert_eq!(outcome.effective_tier, 0);
        assert!(outcome.resource_spent.is_none());
    }

    #[test]
    fn test_levelled_ability_needs_slot_pool() {
        let mut fighter = sample_fighter("Brom");
        fighter.tier_access = 3;
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::slot();
        let ctx = CastingContext::new(&fighter, missile, &options, &config);
        assert!(!SlotHandler.is_available(&ctx));
    }

    #[test]
    fn test_action_cost_only_in_encounter() {
        let mut wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::slot();

        let ctx = CastingContext::new(&wizard, missile, &options, &config);
        let mut rng = SequenceRolls::new(vec![1]);
        let outcome = SlotHandler.cast(&ctx, &mut rng).unwrap();
        assert!(!outcome
            .changes
            .iter()
            .any(|c| matches!(c, Change::ActionsSpent { .. })));

        wizard.start_encounter();
        let ctx = CastingContext::new(&wizard, missile, &options, &config);
        let outcome = SlotHandler.cast(&ctx, &mut rng).unwrap();
        assert_eq!(outcome.changes[0], Change::ActionsSpent { amount: 1 });
    }

    #[test]
    fn test_action_shortfall() {
        let mut wizard = sample_wizard("Elara");
        wizard.start_encounter();
        wizard.action_tracker.current = 0;
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::slot();
        let ctx = CastingContext::new(&wizard, missile, &options, &config);

        let mut rng = SequenceRolls::new(vec![1]);
        let err = SlotHandler.cast(&ctx, &mut rng).unwrap_err();
        assert!(matches!(err, CastingError::ActionShortfall { .. }));
        assert!(err.to_string().contains("Not enough actions"));
    }

    #[test]
    fn test_no_slots_left() {
        let mut wizard = sample_wizard("Elara");
        wizard.set_resource_value("spell_slots", 0).unwrap();
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::slot();
        let ctx = CastingContext::new(&wizard, missile, &options, &config);

        let mut rng = SequenceRolls::new(vec![1]);
        let err = SlotHandler.cast(&ctx, &mut rng).unwrap_err();
        assert_eq!(
            err,
            CastingError::InsufficientResource {
                warning: "No spell slots remaining".to_string()
            }
        );
    }

    #[test]
    fn test_advantage_reaches_formula() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let ability = crate::abilities::AbilityDefinition::spell("true_strike", "True Strike", 0)
            .with_formula("1d20+INT");
        let options = CastOptions::slot().with_advantage(1);
        let ctx = CastingContext::new(&wizard, &ability, &options, &config);

        let mut rng = SequenceRolls::new(vec![4, 17]);
        let outcome = SlotHandler.cast(&ctx, &mut rng).unwrap();
        let roll = outcome.roll.unwrap();
        assert_eq!(roll.total, 17 + wizard.attributes.get("INT"));
    }
}
