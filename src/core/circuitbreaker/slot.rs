use super::*;
use crate::base::{BaseSlot, BlockType, EntryContext, RuleCheckSlot, TokenResult};
use crate::logging;
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 3000;

/// A RuleCheckSlot consulting the circuit breakers of the resource.
pub struct CircuitBreakerSlot {}

lazy_static! {
    pub static ref DEFAULT_CIRCUIT_BREAKER_SLOT: Arc<CircuitBreakerSlot> =
        Arc::new(CircuitBreakerSlot {});
}

pub fn default_circuit_breaker_slot() -> Arc<CircuitBreakerSlot> {
    DEFAULT_CIRCUIT_BREAKER_SLOT.clone()
}

impl BaseSlot for CircuitBreakerSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for CircuitBreakerSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        if ctx.resource().name().is_empty() {
            return ctx.result().clone();
        }
        if let Some(rule) = first_rejection(ctx) {
            logging::debug!(
                "circuit breaker rejected the entry, rule: {:?}",
                rule
            );
            ctx.set_result(TokenResult::new_blocked_with_msg(
                BlockType::CircuitBreaking,
                "circuit breaker check blocked".into(),
            ));
        }
        ctx.result().clone()
    }
}

/// `None` indicates the entry passes every breaker,
/// `Some(rule)` names the rule whose breaker rejected it.
fn first_rejection(ctx: &EntryContext) -> Option<Arc<Rule>> {
    let breakers = get_breakers_of_resource(ctx.resource().name());
    for breaker in breakers {
        if !breaker.try_pass(ctx) {
            return Some(Arc::clone(breaker.bound_rule()));
        }
    }
    None
}
