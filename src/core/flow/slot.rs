use super::*;
use crate::base::{
    BaseSlot, EntryContext, RuleCheckSlot, StatNode, TokenResult, LIMIT_ORIGIN_DEFAULT,
    LIMIT_ORIGIN_OTHER,
};
use crate::stat;
use crate::utils;
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 2000;

/// A RuleCheckSlot applying the flow rules of the resource.
pub struct FlowSlot {}

lazy_static! {
    pub static ref DEFAULT_FLOW_SLOT: Arc<FlowSlot> = Arc::new(FlowSlot {});
}

pub fn default_flow_slot() -> Arc<FlowSlot> {
    DEFAULT_FLOW_SLOT.clone()
}

impl BaseSlot for FlowSlot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for FlowSlot {
    fn check(&self, ctx: &mut EntryContext) -> TokenResult {
        let res = ctx.resource().name().clone();
        let tcs = get_traffic_controller_list_for(&res);
        if tcs.is_empty() {
            return ctx.result().clone();
        }
        // origins explicitly named by rules of this resource, for the
        // `"other"` catch-all
        let named_origins: Vec<&String> = tcs
            .iter()
            .map(|tc| &tc.rule().limit_app)
            .filter(|app| *app != LIMIT_ORIGIN_DEFAULT && *app != LIMIT_ORIGIN_OTHER)
            .collect();
        for tc in &tcs {
            let node = match select_node_for(tc, ctx, &named_origins) {
                Some(node) => node,
                None => continue,
            };
            let input = ctx.input();
            let r = tc.perform_checking(Some(node), input.batch_count(), input.flag());
            match r {
                TokenResult::Pass => {}
                TokenResult::Blocked(_) => {
                    ctx.set_result(r);
                    return ctx.result().clone();
                }
                // serve the pacing delay here and admit, so the stat slots
                // see a plain pass and the concurrency gauge stays balanced
                TokenResult::Wait(nanos) => {
                    utils::sleep_for_ns(nanos);
                }
            }
        }
        ctx.result().clone()
    }
}

// Picks the statistic node a controller is checked against, or `None` when
// the rule does not apply to this entry.
fn select_node_for(
    tc: &Arc<Controller>,
    ctx: &EntryContext,
    named_origins: &[&String],
) -> Option<Arc<dyn StatNode>> {
    let rule = tc.rule();
    let origin = ctx.origin();
    let node = if rule.limit_app == LIMIT_ORIGIN_DEFAULT {
        ctx.cluster_node()
    } else if rule.limit_app == *origin {
        ctx.origin_node()
    } else if rule.limit_app == LIMIT_ORIGIN_OTHER && !named_origins.contains(&origin) {
        ctx.origin_node()
    } else {
        return None;
    };
    match rule.relation_strategy {
        RelationStrategy::Direct => node,
        RelationStrategy::Related => stat::get_cluster_node(&rule.ref_resource)
            .map(|node| node as Arc<dyn StatNode>),
        RelationStrategy::Chain => {
            if ctx.ctx_name() == &rule.ref_resource {
                ctx.stat_node()
            } else {
                None
            }
        }
    }
}
