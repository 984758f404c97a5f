use super::*;
use crate::{
    base::{
        BaseSlot, BlockType, ConcurrencyStat, EntryContext, MetricEvent, ReadStat, RuleCheckSlot,
        Snapshot, TokenResult, TrafficType,
    },
    stat,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// AdaptiveSlot rejects inbound traffic once a process-wide metric
/// crosses the threshold of a loaded system rule.
pub struct AdaptiveSlot {}

lazy_static! {
    pub static ref DEFAULT_ADAPTIVE_SLOT: Arc<AdaptiveSlot> = Arc::new(AdaptiveSlot {});
}

pub fn default_adaptive_slot() -> Arc<AdaptiveSlot> {
    DEFAULT_ADAPTIVE_SLOT.clone()
}

impl BaseSlot for AdaptiveSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for AdaptiveSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        if *ctx.resource().traffic_type() != TrafficType::Inbound {
            return ctx.result().clone();
        }
        for rule in get_rules() {
            let (passed, msg, snapshot) = can_pass_check(&rule);
            if passed {
                continue;
            }
            // snapshot is always set when the check fails
            ctx.set_result(TokenResult::new_blocked_with_cause(
                BlockType::SystemFlow,
                msg,
                rule.clone(),
                snapshot.unwrap(),
            ));
            break;
        }
        ctx.result().clone()
    }
}

fn can_pass_check(rule: &Arc<Rule>) -> (bool, String, Option<Arc<Snapshot>>) {
    let threshold = rule.threshold;
    let inbound = stat::inbound_node();
    match rule.metric_type {
        MetricType::InboundQPS => {
            let qps = inbound.qps(MetricEvent::Pass);
            if qps >= threshold {
                return (
                    false,
                    "system qps check blocked".into(),
                    Some(Arc::new(qps) as Arc<Snapshot>),
                );
            }
        }
        MetricType::Concurrency => {
            let n = inbound.current_concurrency() as f64;
            if n >= threshold {
                return (
                    false,
                    "system concurrency check blocked".into(),
                    Some(Arc::new(n) as Arc<Snapshot>),
                );
            }
        }
        MetricType::AvgRT => {
            let rt = inbound.avg_rt();
            if rt >= threshold {
                return (
                    false,
                    "system avg rt check blocked".into(),
                    Some(Arc::new(rt) as Arc<Snapshot>),
                );
            }
        }
    }
    (true, String::new(), None)
}
