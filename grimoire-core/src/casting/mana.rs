//! Mana casting: pay one mana per tier, upcasting at the caller's request.

use super::{CastingContext, CastingCost, CastingMethodHandler, MethodType, ResourceSpend};

/// Casts abilities by spending mana.
///
/// Cost is `base_tier + max(0, target_tier - base_tier)`. Cantrips are free.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManaHandler;

impl ManaHandler {
    pub fn new() -> Self {
        Self
    }

    /// Mana required to cast at the context's target tier.
    pub fn mana_cost(ctx: &CastingContext<'_>) -> i32 {
        if ctx.ability.is_cantrip() {
            return 0;
        }
        let base = ctx.ability.tier as i32;
        let target = ctx.target_tier() as i32;
        base + (target - base).max(0)
    }
}

impl CastingMethodHandler for ManaHandler {
    fn method(&self) -> MethodType {
        MethodType::Mana
    }

    fn display_name(&self) -> &'static str {
        "Mana"
    }

    fn description(&self) -> &'static str {
        "Spend mana equal to the tier cast; higher tiers cost more"
    }

    fn is_available(&self, ctx: &CastingContext<'_>) -> bool {
        if ctx.ability.is_cantrip() {
            return true;
        }
        ctx.ability.costs_resource(&ctx.config.mana_resource_id)
            && ctx.target_tier() <= ctx.tier_ceiling()
    }

    fn unavailable_reason(&self, ctx: &CastingContext<'_>) -> String {
        if !ctx.ability.costs_resource(&ctx.config.mana_resource_id) {
            format!("{} does not draw on mana", ctx.ability.name)
        } else {
            format!(
                "tier {} exceeds tier access {}",
                ctx.target_tier(),
                ctx.tier_ceiling()
            )
        }
    }

    fn calculate_cost(&self, ctx: &CastingContext<'_>) -> CastingCost {
        if ctx.ability.is_cantrip() {
            return CastingCost::free("Free (cantrip)");
        }

        let resource_id = &ctx.config.mana_resource_id;
        let cost = Self::mana_cost(ctx);
        let available = ctx.character.resource_value(resource_id);
        let maximum = ctx.character.resource_max(resource_id).unwrap_or(0);

        CastingCost::priced(
            ResourceSpend {
                resource_id: resource_id.clone(),
                amount: cost,
            },
            format!("{cost} mana"),
            available,
            maximum,
            |required, have| format!("Not enough mana: requires {required}, have {have}"),
        )
    }

    fn can_upcast(&self, ctx: &CastingContext<'_>) -> bool {
        !ctx.ability.is_cantrip() && ctx.ability.tier < ctx.tier_ceiling()
    }

    fn effective_tier(&self, ctx: &CastingContext<'_>) -> u8 {
        if ctx.ability.is_cantrip() {
            0
        } else {
            ctx.target_tier()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::get_ability;
    use crate::casting::{CastOptions, CastingError, RiskLevel};
    use crate::config::EngineConfig;
    use crate::testing::{sample_wizard, SequenceRolls};

    #[test]
    fn test_cost_scales_with_target_tier() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();

        for target in 1..=3 {
            let options = CastOptions::mana().at_tier(target);
            let ctx = CastingContext::new(&wizard, missile, &options, &config);
            let cost = ManaHandler.calculate_cost(&ctx);
            let expected = 1 + (target as i32 - 1).max(0);
            assert_eq!(cost.description, format!("{expected} mana"));
            assert!(cost.can_afford);
        }
    }

    #[test]
    fn test_target_below_base_costs_base() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let fireball = get_ability("fireball").unwrap();
        let options = CastOptions::mana().at_tier(1);
        let ctx = CastingContext::new(&wizard, fireball, &options, &config);
        assert_eq!(ManaHandler::mana_cost(&ctx), 3);
    }

    #[test]
    fn test_cantrip_is_free() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let fire_bolt = get_ability("fire_bolt").unwrap();
        let options = CastOptions::mana();
        let ctx = CastingContext::new(&wizard, fire_bolt, &options, &config);

        assert!(ManaHandler.is_available(&ctx));
        let cost = ManaHandler.calculate_cost(&ctx);
        assert_eq!(cost.description, "Free (cantrip)");
        assert!(cost.resource_cost.is_none());

        let mut rng = SequenceRolls::new(vec![7]);
        let outcome = ManaHandler.cast(&ctx, &mut rng).unwrap();
        assert_eq!(outcome.effective_tier, 0);
        assert!(outcome.resource_spent.is_none());
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn test_unavailable_above_tier_access() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::mana().at_tier(wizard.tier_access() + 1);
        let ctx = CastingContext::new(&wizard, missile, &options, &config);
        assert!(!ManaHandler.is_available(&ctx));
    }

    #[test]
    fn test_unavailable_without_mana_cost() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default().with_mana_resource("essence");
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::mana();
        let ctx = CastingContext::new(&wizard, missile, &options, &config);
        assert!(!ManaHandler.is_available(&ctx));
    }

    #[test]
    fn test_cast_spends_and_resolves_at_target() {
        let wizard = sample_wizard("Elara");
        let config = EngineConfig::default();
        let missile = get_ability("magic_missile").unwrap();
        let options = CastOptions::mana().at_tier(2);
        let ctx = CastingContext::new(&wizard, missile, &options, &config);

        let mut rng = SequenceRolls::new(vec![2]);
        let outcome = ManaHandler.cast(&ctx, &mut rng).unwrap();

        assert_eq!(outcome.effective_tier, 2);
        let spent = outcome.resource_spent.as_ref().unwrap();
        assert_eq!(spent.amount, 2);
        // 3d4+3 plus one upcast 1d4+1, every die showing 2
        assert_eq!(outcome.roll.as_ref().unwrap().total, 12);
    }

    #[test]
    fn test_unaffordable_cast_fails_with_warning() {
        let mut wizard = sample_wizard("Elara");
        wizard.set_resource_value("mana", 2).unwrap();
        let config = EngineConfig::default();
        let fireball = get_ability("fireball").unwrap();
        let options = CastOptions::mana();
        let ctx = CastingContext::new(&wizard, fireball, &options, &config);

        let cost = ManaHandler.calculate_cost(&ctx);
        assert!(!cost.can_afford);
        assert_eq!(cost.risk_level, RiskLevel::High);

        let mut rng = SequenceRolls::new(vec![3]);
        let err = ManaHandler.cast(&ctx, &mut rng).unwrap_err();
        assert_eq!(
            err,
            CastingError::InsufficientResource {
                warning: "Not enough mana: requires 3, have 2".to_string()
            }
        );
    }
}
