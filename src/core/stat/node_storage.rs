use super::{ClusterNode, StatisticNode};
use crate::{
    base::{ResourceType, MAX_SLOT_CHAIN_SIZE, TOTAL_IN_RESOURCE_NAME},
    logging,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ClusterNodeMap = HashMap<String, Arc<ClusterNode>>;

lazy_static! {
    pub static ref INBOUND_NODE: Arc<StatisticNode> = Arc::new(StatisticNode::new(
        TOTAL_IN_RESOURCE_NAME.into(),
        ResourceType::Common
    ));
    static ref CLUSTER_NODE_MAP: RwLock<ClusterNodeMap> = RwLock::new(ClusterNodeMap::new());
}

/// inbound_node returns the node aggregating all inbound traffic of the process.
pub fn inbound_node() -> Arc<StatisticNode> {
    INBOUND_NODE.clone()
}

// cluster_node_list returns all existing resource level nodes.
pub fn cluster_node_list() -> Vec<Arc<ClusterNode>> {
    let node_map = CLUSTER_NODE_MAP.read().unwrap();
    node_map.values().cloned().collect()
}

pub fn get_cluster_node(res_name: &str) -> Option<Arc<ClusterNode>> {
    let node_map = CLUSTER_NODE_MAP.read().unwrap();
    node_map.get(res_name).cloned()
}

pub fn get_or_create_cluster_node(
    res_name: &str,
    resource_type: &ResourceType,
) -> Arc<ClusterNode> {
    if let Some(node) = get_cluster_node(res_name) {
        return node;
    }
    let mut node_map = CLUSTER_NODE_MAP.write().unwrap();
    if node_map.len() >= MAX_SLOT_CHAIN_SIZE {
        logging::warn!(
            "[get_or_create_cluster_node] Resource amount exceeds the threshold {}",
            MAX_SLOT_CHAIN_SIZE
        )
    }
    node_map
        .entry(res_name.into())
        .or_insert_with(|| Arc::new(ClusterNode::new(res_name.into(), *resource_type)))
        .clone()
}

pub fn remove_cluster_node(res_name: &str) {
    CLUSTER_NODE_MAP.write().unwrap().remove(res_name);
}

pub fn reset_cluster_node_map() {
    CLUSTER_NODE_MAP.write().unwrap().clear();
}
