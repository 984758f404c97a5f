use crate::{base::RampartRule, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// The global metric a system protection rule guards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// inbound pass throughput per second of the whole process
    InboundQPS,
    /// concurrent in-flight inbound requests of the whole process
    Concurrency,
    /// average response time (in ms) over recent inbound requests
    AvgRT,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::InboundQPS
    }
}

/// Rule describes a system-wide protection threshold on one metric.
/// Every inbound entry is checked against all loaded rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique id, generated when absent
    pub id: String,
    pub metric_type: MetricType,
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: Uuid::new_v4().to_string(),
            metric_type: MetricType::default(),
            threshold: 0.0,
        }
    }
}

impl RampartRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> Result<()> {
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        Ok(())
    }
}

impl Hash for Rule {
    // `id` stays out of the hash, equality ignores it too
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.metric_type.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type && self.threshold == other.threshold
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(fmtted) => write!(f, "{}", fmtted),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
