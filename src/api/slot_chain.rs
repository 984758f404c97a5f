use crate::base::{SlotChain, MAX_SLOT_CHAIN_SIZE};
use crate::{circuitbreaker, flow, stat, system};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref CHAIN_MAP: RwLock<HashMap<String, Arc<SlotChain>>> =
        RwLock::new(HashMap::new());
    /// shared chain with no slots, admits everything and records nothing
    static ref PASS_THROUGH_CHAIN: Arc<SlotChain> = Arc::new(SlotChain::new());
}

fn new_resource_slot_chain() -> Arc<SlotChain> {
    let mut sc = SlotChain::new();

    // the prepare slots hold per resource state, so they are chain-local
    sc.add_stat_prepare_slot(Arc::new(stat::NodeSelectorSlot::new())); // 1000
    sc.add_stat_prepare_slot(Arc::new(stat::ClusterBuilderSlot::new())); // 2000

    sc.add_rule_check_slot(system::default_adaptive_slot()); // 1000
    sc.add_rule_check_slot(flow::default_flow_slot()); // 2000
    sc.add_rule_check_slot(circuitbreaker::default_circuit_breaker_slot()); // 3000

    sc.add_stat_slot(stat::default_resource_stat_slot()); // 1000
    sc.add_stat_slot(circuitbreaker::default_metric_stat_slot()); // 2000
    Arc::new(sc)
}

/// resource_slot_chain returns the slot chain of the given resource,
/// building and caching it on first acquisition. Once `MAX_SLOT_CHAIN_SIZE`
/// distinct resources exist, further resources get `None` and should be
/// admitted unmonitored.
pub fn resource_slot_chain(res_name: &str) -> Option<Arc<SlotChain>> {
    if let Some(sc) = CHAIN_MAP.read().unwrap().get(res_name) {
        return Some(Arc::clone(sc));
    }
    let mut chain_map = CHAIN_MAP.write().unwrap();
    // double check, another thread may have built it meanwhile
    if let Some(sc) = chain_map.get(res_name) {
        return Some(Arc::clone(sc));
    }
    if chain_map.len() >= MAX_SLOT_CHAIN_SIZE {
        return None;
    }
    let sc = new_resource_slot_chain();
    chain_map.insert(res_name.into(), Arc::clone(&sc));
    Some(sc)
}

/// pass_through_slot_chain returns the shared empty chain used for
/// resources beyond the cache cap.
pub fn pass_through_slot_chain() -> Arc<SlotChain> {
    Arc::clone(&PASS_THROUGH_CHAIN)
}
