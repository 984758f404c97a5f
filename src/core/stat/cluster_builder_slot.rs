use super::get_or_create_cluster_node;
use crate::base::{BaseSlot, EntryContext, StatPrepareSlot};

const CLUSTER_BUILDER_SLOT_ORDER: u32 = 2000;

/// ClusterBuilderSlot attaches the resource level node to the context and,
/// for named callers, the per-origin node. Runs after the node selector.
pub struct ClusterBuilderSlot {}

impl ClusterBuilderSlot {
    pub fn new() -> Self {
        ClusterBuilderSlot {}
    }
}

impl Default for ClusterBuilderSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        CLUSTER_BUILDER_SLOT_ORDER
    }
}

impl StatPrepareSlot for ClusterBuilderSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        if ctx.is_untracked() {
            return;
        }
        let res = ctx.resource().clone();
        let cluster = get_or_create_cluster_node(res.name(), res.classification());
        if !ctx.origin().is_empty() {
            ctx.set_origin_node(cluster.origin_node(ctx.origin().as_str()));
        }
        ctx.set_cluster_node(cluster);
    }
}
