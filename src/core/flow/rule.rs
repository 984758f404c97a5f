use crate::base::{RampartRule, LIMIT_ORIGIN_DEFAULT};
use crate::{logging, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type Id = String;

/// WARM_UP_COLD_FACTOR is the default cold factor of warm-up shaping.
pub const WARM_UP_COLD_FACTOR: u32 = 3;
const DEFAULT_MAX_QUEUEING_TIME_MS: u32 = 500;

/// MetricType indicates which statistic the threshold applies to.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricType {
    /// Concurrency limits simultaneous in-flight requests.
    Concurrency,
    /// QPS limits the pass count per statistic interval.
    QPS,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::QPS
    }
}

/// RelationStrategy decides which resource's statistic the rule is checked against.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationStrategy {
    /// Direct means flow control on the current resource.
    Direct,
    /// Related means flow control by the statistic of `ref_resource`.
    Related,
    /// Chain means flow control on the current resource, but only for entries
    /// whose context name equals `ref_resource`.
    Chain,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Direct
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Hash, Eq)]
pub enum ControlStrategy {
    /// Reject overflowing requests immediately.
    Reject,
    /// WarmUp ramps the allowed rate up from a cold start.
    WarmUp,
    /// Throttling spaces requests evenly, queueing them up to
    /// `max_queueing_time_ms`.
    Throttling,
    /// WarmUpThrottling combines the warm-up ramp with even spacing.
    WarmUpThrottling,
    #[serde(skip)]
    Custom(u8),
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

/// Rule describes one flow control strategy of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// `id` is the unique ID of the rule (optional, generated when absent).
    pub id: Id,
    /// `resource` is the resource name the rule guards.
    pub resource: String,
    /// `limit_app` scopes the rule to an origin: "default" matches callers
    /// not named by any origin rule, "other" matches origins no other rule of
    /// this resource names, anything else matches that exact origin.
    pub limit_app: String,
    pub metric_type: MetricType,
    /// `threshold` means QPS per statistic interval, or the concurrency cap.
    pub threshold: f64,
    pub relation_strategy: RelationStrategy,
    pub ref_resource: String,
    pub control_strategy: ControlStrategy,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` bounds the virtual queue of throttling shaping
    /// and the borrow window of prioritized requests.
    pub max_queueing_time_ms: u32,
    /// `global_mode` marks a process-wide rule, checked for every caller of
    /// the resource regardless of which context it enters from.
    pub global_mode: bool,
    /// `cluster_mode` is parsed and validated but token coordination across
    /// processes is not performed.
    pub cluster_mode: bool,
}

impl Hash for Rule {
    // `id` stays out of the hash, equality ignores it too
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
        self.ref_resource.hash(state);
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_app: LIMIT_ORIGIN_DEFAULT.into(),
            metric_type: MetricType::default(),
            threshold: 0.0,
            relation_strategy: RelationStrategy::default(),
            ref_resource: String::default(),
            control_strategy: ControlStrategy::default(),
            warm_up_period_sec: 0,
            warm_up_cold_factor: WARM_UP_COLD_FACTOR,
            max_queueing_time_ms: DEFAULT_MAX_QUEUEING_TIME_MS,
            global_mode: false,
            cluster_mode: false,
        }
    }
}

impl Rule {
    pub fn uses_warm_up(&self) -> bool {
        matches!(
            self.control_strategy,
            ControlStrategy::WarmUp | ControlStrategy::WarmUpThrottling
        )
    }

    pub fn uses_throttling(&self) -> bool {
        matches!(
            self.control_strategy,
            ControlStrategy::Throttling | ControlStrategy::WarmUpThrottling
        )
    }
}

impl RampartRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.relation_strategy != RelationStrategy::Direct && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non empty when relation_strategy is Related or Chain",
            ));
        }
        if self.uses_warm_up() {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be greater than 0"));
            }
            if self.warm_up_cold_factor <= 1 {
                return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
            }
        }
        if self.global_mode && self.cluster_mode {
            return Err(Error::msg(
                "global_mode and cluster_mode cannot both be set",
            ));
        }
        if self.cluster_mode {
            logging::info!(
                "cluster_mode is set on rule of resource {}, token coordination is not performed",
                self.resource
            );
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    // `id` deliberately does not participate, reload reuse is decided by value
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_app == other.limit_app
            && self.metric_type == other.metric_type
            && self.ref_resource == other.ref_resource
            && self.relation_strategy == other.relation_strategy
            && self.control_strategy == other.control_strategy
            && self.threshold == other.threshold
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.global_mode == other.global_mode
            && self.cluster_mode == other.cluster_mode
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
