//! Resource

use serde::{Deserialize, Serialize};
use std::fmt;

/// ResourceType describes the classification of the guarded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Common,
    Web,
    RPC,
    Gateway,
    DB,
    Cache,
    MQ,
}

impl Default for ResourceType {
    fn default() -> Self {
        ResourceType::Common
    }
}

impl From<u8> for ResourceType {
    fn from(v: u8) -> Self {
        match v {
            1 => ResourceType::Web,
            2 => ResourceType::RPC,
            3 => ResourceType::Gateway,
            4 => ResourceType::DB,
            5 => ResourceType::Cache,
            6 => ResourceType::MQ,
            _ => ResourceType::Common,
        }
    }
}

/// TrafficType describes the traffic type: Inbound or Outbound.
/// Only inbound traffic takes part in system adaptive protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficType {
    Inbound,
    Outbound,
}

impl Default for TrafficType {
    fn default() -> Self {
        TrafficType::Outbound
    }
}

/// ResourceWrapper represents the invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResourceWrapper {
    /// global unique resource name
    name: String,
    /// resource classification
    classification: ResourceType,
    /// Inbound or Outbound
    flow_type: TrafficType,
}

impl ResourceWrapper {
    pub fn new(name: String, classification: ResourceType, flow_type: TrafficType) -> Self {
        ResourceWrapper {
            name,
            classification,
            flow_type,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn classification(&self) -> &ResourceType {
        &self.classification
    }

    pub fn traffic_type(&self) -> &TrafficType {
        &self.flow_type
    }
}

impl fmt::Display for ResourceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceWrapper{{name={}, flowType={:?}, classification={:?}}}",
            self.name, self.flow_type, self.classification
        )
    }
}
