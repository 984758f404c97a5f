use super::StatisticNode;
use crate::base::{BaseSlot, EntryContext, StatPrepareSlot, MAX_CONTEXT_NAME_SIZE};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const NODE_SELECTOR_SLOT_ORDER: u32 = 1000;

/// NodeSelectorSlot picks the default statistic node of the entry, one per
/// call context name. The slot is chain-local, so the map below is scoped to
/// a single resource.
pub struct NodeSelectorSlot {
    nodes: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl NodeSelectorSlot {
    pub fn new() -> Self {
        NodeSelectorSlot {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for NodeSelectorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        NODE_SELECTOR_SLOT_ORDER
    }
}

impl StatPrepareSlot for NodeSelectorSlot {
    fn prepare(&self, ctx: &mut EntryContext) {
        if let Some(node) = self.nodes.read().unwrap().get(ctx.ctx_name()) {
            ctx.set_stat_node(node.clone());
            return;
        }
        let res = ctx.resource().clone();
        let mut nodes = self.nodes.write().unwrap();
        // the cap bounds memory per resource, entries past it stay untracked:
        // no rule checks, no statistics
        if nodes.len() >= MAX_CONTEXT_NAME_SIZE && !nodes.contains_key(ctx.ctx_name()) {
            ctx.set_untracked();
            return;
        }
        let node = nodes
            .entry(ctx.ctx_name().clone())
            .or_insert_with(|| {
                Arc::new(StatisticNode::new(
                    res.name().into(),
                    *res.classification(),
                ))
            })
            .clone();
        ctx.set_stat_node(node);
    }
}
