//! Public entry point for casting: look up the ability, pick the handler,
//! run the availability, cost and cast pipeline.

use super::{
    CastOptions, CastingContext, CastingCost, CastingError, CastingMethodHandler, CastingResult,
    ManaHandler, MethodType, SlotHandler,
};
use crate::character::Character;
use crate::config::EngineConfig;
use crate::dice::RollSource;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Registered casting methods.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MethodType, Box<dyn CastingMethodHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the mana and slot handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ManaHandler::new()));
        registry.register(Box::new(SlotHandler::new()));
        registry
    }

    /// Register a handler, replacing any handler for the same method.
    pub fn register(&mut self, handler: Box<dyn CastingMethodHandler>) {
        self.handlers.insert(handler.method(), handler);
    }

    pub fn get(&self, method: MethodType) -> Option<&dyn CastingMethodHandler> {
        self.handlers.get(&method).map(|h| h.as_ref())
    }

    /// Registered methods in a stable order.
    pub fn methods(&self) -> Vec<MethodType> {
        let mut methods: Vec<MethodType> = self.handlers.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Routes casts to the registered handler for the requested method.
///
/// The dispatcher only reads the character; apply the returned
/// [`CastOutcome::changes`](super::CastOutcome::changes) to commit a cast.
#[derive(Debug)]
pub struct CastingDispatcher {
    registry: HandlerRegistry,
    config: EngineConfig,
}

impl CastingDispatcher {
    pub fn new(registry: HandlerRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Default options for this dispatcher's configured method.
    pub fn default_options(&self) -> CastOptions {
        CastOptions::new(self.config.default_method)
    }

    /// Cast a known ability.
    pub fn cast_ability(
        &self,
        character: &Character,
        ability_id: &str,
        options: &CastOptions,
        rng: &mut dyn RollSource,
    ) -> CastingResult {
        let ability = character
            .find_ability(ability_id, options.kind)
            .ok_or_else(|| {
                warn!(character = %character.name, ability_id, "Ability not found");
                CastingError::NotFound(ability_id.to_string())
            })?;

        let handler = self.registry.get(options.method).ok_or_else(|| {
            CastingError::MethodUnavailable {
                method: options.method,
                reason: "no handler registered".to_string(),
            }
        })?;

        let ctx = CastingContext::new(character, ability, options, &self.config);

        if !handler.is_available(&ctx) {
            let reason = handler.unavailable_reason(&ctx);
            debug!(ability_id, method = %options.method, %reason, "Method unavailable");
            return Err(CastingError::MethodUnavailable {
                method: options.method,
                reason,
            });
        }

        let cost = handler.calculate_cost(&ctx);
        if !cost.can_afford {
            let warning = cost
                .warning_message
                .unwrap_or_else(|| format!("Cannot afford {}", cost.description));
            debug!(ability_id, method = %options.method, %warning, "Cannot afford cast");
            return Err(CastingError::InsufficientResource { warning });
        }

        let result = handler.cast(&ctx, rng);
        match &result {
            Ok(outcome) => info!(
                character = %character.name,
                ability = %ability.name,
                method = %options.method,
                tier = outcome.effective_tier,
                "Ability cast"
            ),
            Err(e) => warn!(character = %character.name, ability_id, error = %e, "Cast failed"),
        }
        result
    }

    /// Methods through which the ability could be cast right now.
    ///
    /// Each registered handler is checked with `options` retargeted to its
    /// method, or with default options when none are given.
    pub fn available_methods(
        &self,
        character: &Character,
        ability_id: &str,
        options: Option<&CastOptions>,
    ) -> Vec<MethodType> {
        let base = options.cloned().unwrap_or_else(|| self.default_options());
        let Some(ability) = character.find_ability(ability_id, base.kind) else {
            return Vec::new();
        };

        self.registry
            .methods()
            .into_iter()
            .filter(|&method| {
                let Some(handler) = self.registry.get(method) else {
                    return false;
                };
                let retargeted = base.via(method);
                let ctx = CastingContext::new(character, ability, &retargeted, &self.config);
                handler.is_available(&ctx)
            })
            .collect()
    }

    /// Price a cast without performing it. `None` when the ability or
    /// handler is missing, or the method is unavailable.
    pub fn calculate_cost(
        &self,
        character: &Character,
        ability_id: &str,
        options: &CastOptions,
    ) -> Option<CastingCost> {
        let ability = character.find_ability(ability_id, options.kind)?;
        let handler = self.registry.get(options.method)?;
        let ctx = CastingContext::new(character, ability, options, &self.config);
        handler
            .is_available(&ctx)
            .then(|| handler.calculate_cost(&ctx))
    }

    pub fn can_upcast(
        &self,
        character: &Character,
        ability_id: &str,
        options: &CastOptions,
    ) -> bool {
        let Some(ability) = character.find_ability(ability_id, options.kind) else {
            return false;
        };
        let Some(handler) = self.registry.get(options.method) else {
            return false;
        };
        let ctx = CastingContext::new(character, ability, options, &self.config);
        handler.can_upcast(&ctx)
    }
}

impl Default for CastingDispatcher {
    fn default() -> Self {
        Self::new(HandlerRegistry::with_defaults(), EngineConfig::default())
    }
}
