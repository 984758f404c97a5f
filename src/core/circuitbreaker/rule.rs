use super::*;
use crate::{base::RampartRule, logging, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Rule encompasses the fields of a circuit breaking rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique id, generated when absent
    pub id: String,
    /// resource name
    pub resource: String,
    pub strategy: BreakerStrategy,
    /// `retry_timeout_ms` represents the recovery timeout (in milliseconds) before the circuit
    /// breaker leaves the open state. During the open period no requests are permitted until
    /// the timeout has elapsed, after which the breaker turns half-open for a probe request.
    pub retry_timeout_ms: u32,
    /// `min_request_amount` represents the minimum number of requests (in an active statistic
    /// time span) that can trigger circuit breaking.
    pub min_request_amount: u64,
    /// `stat_interval_ms` represents the statistic time interval of the internal circuit
    /// breaker (in ms), collected by a sliding window.
    pub stat_interval_ms: u32,
    /// `stat_sliding_window_bucket_count` represents the bucket count of the statistic sliding
    /// window. The statistic gets more precise as the bucket count increases, at a memory cost.
    /// `stat_interval_ms % stat_sliding_window_bucket_count == 0` must hold, otherwise the
    /// bucket count falls back to 1.
    pub stat_sliding_window_bucket_count: u32,
    /// `max_allowed_rt_ms` indicates that any invocation whose response time exceeds this value
    /// (in ms) is recorded as a slow request.
    /// `max_allowed_rt_ms` only takes effect for the `SlowRequestRatio` strategy.
    pub max_allowed_rt_ms: u64,
    /// `threshold` represents the threshold of the circuit breaker.
    /// For `SlowRequestRatio` it is the max slow request ratio,
    /// for `ErrorRatio` the max error request ratio,
    /// for `ErrorCount` the max error request count.
    pub threshold: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: Uuid::new_v4().to_string(),
            resource: String::default(),
            strategy: BreakerStrategy::default(),
            retry_timeout_ms: 0,
            min_request_amount: 0,
            stat_interval_ms: 1000,
            stat_sliding_window_bucket_count: 1,
            max_allowed_rt_ms: 0,
            threshold: 0.0,
        }
    }
}

impl Rule {
    /// Breakers built from rules that only differ in thresholds can keep the
    /// accumulated outcome window.
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.strategy == other.strategy
            && self.stat_interval_ms == other.stat_interval_ms
            && self.stat_sliding_window_bucket_count == other.stat_sliding_window_bucket_count
    }

    pub fn get_rule_stat_sliding_window_bucket_count(&self) -> u32 {
        let interval = self.stat_interval_ms;
        let mut bucket_count = self.stat_sliding_window_bucket_count;
        if bucket_count == 0 || interval % bucket_count != 0 {
            bucket_count = 1
        }
        bucket_count
    }
}

impl RampartRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.stat_interval_ms == 0 {
            return Err(Error::msg("invalid stat_interval_ms"));
        }
        if self.retry_timeout_ms == 0 {
            return Err(Error::msg("invalid retry_timeout_ms"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("invalid threshold"));
        }
        if self.strategy != BreakerStrategy::ErrorCount && self.threshold > 1.0 {
            return Err(Error::msg(format!(
                "invalid {:?} ratio threshold (valid range: [0.0, 1.0])",
                self.strategy
            )));
        }
        if self.stat_sliding_window_bucket_count != 0
            && self.stat_interval_ms % self.stat_sliding_window_bucket_count != 0
        {
            logging::warn!("[CircuitBreaker is_valid] The following must be true: stat_interval_ms % stat_sliding_window_bucket_count == 0. stat_sliding_window_bucket_count will be replaced by 1, rule {:?}", self);
        }
        Ok(())
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource.hash(state);
        self.strategy.hash(state);
        self.stat_interval_ms.hash(state);
        self.stat_sliding_window_bucket_count.hash(state);
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        if self.resource == other.resource
            && self.strategy == other.strategy
            && self.retry_timeout_ms == other.retry_timeout_ms
            && self.min_request_amount == other.min_request_amount
            && self.stat_interval_ms == other.stat_interval_ms
            && self.stat_sliding_window_bucket_count == other.stat_sliding_window_bucket_count
        {
            match self.strategy {
                BreakerStrategy::SlowRequestRatio => {
                    self.max_allowed_rt_ms == other.max_allowed_rt_ms
                        && self.threshold == other.threshold
                }
                _ => self.threshold == other.threshold,
            }
        } else {
            false
        }
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn is_valid() {
        let rule = Rule {
            resource: "invoke".into(),
            strategy: BreakerStrategy::ErrorRatio,
            retry_timeout_ms: 3000,
            threshold: 0.5,
            ..Default::default()
        };
        assert!(rule.is_valid().is_ok());

        let bad = Rule {
            resource: "".into(),
            ..rule.clone()
        };
        assert!(bad.is_valid().is_err());
        let bad = Rule {
            retry_timeout_ms: 0,
            ..rule.clone()
        };
        assert!(bad.is_valid().is_err());
        let bad = Rule {
            stat_interval_ms: 0,
            ..rule.clone()
        };
        assert!(bad.is_valid().is_err());
        // ratio strategies cap the threshold at 1.0
        let bad = Rule {
            threshold: 1.5,
            ..rule.clone()
        };
        assert!(bad.is_valid().is_err());
        let good = Rule {
            strategy: BreakerStrategy::ErrorCount,
            threshold: 100.0,
            ..rule
        };
        assert!(good.is_valid().is_ok());
    }

    #[test]
    fn eq_ignores_id() {
        let a = Rule {
            resource: "invoke".into(),
            strategy: BreakerStrategy::ErrorCount,
            retry_timeout_ms: 3000,
            threshold: 10.0,
            ..Default::default()
        };
        let b = Rule {
            id: "fixed".into(),
            ..a.clone()
        };
        assert_eq!(a, b);
        assert!(a.is_stat_reusable(&b));

        let c = Rule {
            threshold: 20.0,
            ..a.clone()
        };
        assert_ne!(a, c);
        // same stat shape even though thresholds differ
        assert!(a.is_stat_reusable(&c));
    }

    #[test]
    fn bucket_count_fallback() {
        let rule = Rule {
            stat_interval_ms: 1000,
            stat_sliding_window_bucket_count: 3,
            ..Default::default()
        };
        assert_eq!(1, rule.get_rule_stat_sliding_window_bucket_count());
        let rule = Rule {
            stat_interval_ms: 1000,
            stat_sliding_window_bucket_count: 4,
            ..Default::default()
        };
        assert_eq!(4, rule.get_rule_stat_sliding_window_bucket_count());
    }
}
