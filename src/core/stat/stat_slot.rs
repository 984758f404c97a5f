use super::inbound_node;
use crate::{
    base::{
        BaseSlot, BlockError, EntryContext, MetricEvent, StatNode, StatSlot, TrafficType,
    },
    utils::curr_time_millis,
};
use lazy_static::lazy_static;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_RESOURCE_STAT_SLOT: Arc<ResourceNodeStatSlot> =
        Arc::new(ResourceNodeStatSlot {});
}

pub fn default_resource_stat_slot() -> Arc<ResourceNodeStatSlot> {
    DEFAULT_RESOURCE_STAT_SLOT.clone()
}

/// ResourceNodeStatSlot feeds the outcome of every admission into the nodes
/// attached by the prepare slots, plus the global inbound node for inbound
/// resources.
pub struct ResourceNodeStatSlot {}

impl ResourceNodeStatSlot {
    fn record_pass_for(&self, node: Arc<dyn StatNode>, count: u32) {
        node.increase_concurrency();
        node.add_count(MetricEvent::Pass, count as u64);
    }

    fn record_block_for(&self, node: Arc<dyn StatNode>, count: u32) {
        node.add_count(MetricEvent::Block, count as u64)
    }

    fn record_complete_for(&self, node: Arc<dyn StatNode>, count: u32, round_trip: u64) {
        node.add_count(MetricEvent::Rt, round_trip);
        node.add_count(MetricEvent::Complete, count as u64);
        node.decrease_concurrency();
    }

    fn touched_nodes(ctx: &EntryContext) -> Vec<Arc<dyn StatNode>> {
        let mut nodes = Vec::with_capacity(4);
        if let Some(node) = ctx.stat_node() {
            nodes.push(node);
        }
        if let Some(node) = ctx.cluster_node() {
            nodes.push(node);
        }
        if let Some(node) = ctx.origin_node() {
            nodes.push(node);
        }
        if *ctx.resource().traffic_type() == TrafficType::Inbound {
            nodes.push(inbound_node() as Arc<dyn StatNode>);
        }
        nodes
    }
}

impl BaseSlot for ResourceNodeStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for ResourceNodeStatSlot {
    fn on_entry_pass(&self, ctx: &EntryContext) {
        let count = ctx.input().batch_count();
        for node in Self::touched_nodes(ctx) {
            self.record_pass_for(node, count);
        }
    }

    fn on_entry_blocked(&self, ctx: &EntryContext, _block_error: BlockError) {
        let count = ctx.input().batch_count();
        for node in Self::touched_nodes(ctx) {
            self.record_block_for(node, count);
        }
    }

    fn on_completed(&self, ctx: &mut EntryContext) {
        let round_trip = curr_time_millis() - ctx.start_time();
        ctx.set_round_trip(round_trip);
        let count = ctx.input().batch_count();
        for node in Self::touched_nodes(ctx) {
            self.record_complete_for(node, count, round_trip);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{ResourceType, ResourceWrapper};
    use crate::stat::{ClusterBuilderSlot, NodeSelectorSlot};
    use crate::base::StatPrepareSlot;

    #[test]
    fn pass_then_complete() {
        let selector = NodeSelectorSlot::new();
        let builder = ClusterBuilderSlot::new();
        let stat = ResourceNodeStatSlot {};

        let mut ctx = EntryContext::new();
        ctx.set_resource(ResourceWrapper::new(
            "stat_slot_test_res".into(),
            ResourceType::Common,
            TrafficType::Outbound,
        ));
        selector.prepare(&mut ctx);
        builder.prepare(&mut ctx);

        stat.on_entry_pass(&ctx);
        let node = ctx.stat_node().unwrap();
        assert_eq!(node.sum(MetricEvent::Pass), 1);
        assert_eq!(node.current_concurrency(), 1);

        stat.on_completed(&mut ctx);
        assert_eq!(node.sum(MetricEvent::Complete), 1);
        assert_eq!(node.current_concurrency(), 0);

        let cluster = ctx.cluster_node().unwrap();
        assert_eq!(cluster.sum(MetricEvent::Pass), 1);
    }
}
