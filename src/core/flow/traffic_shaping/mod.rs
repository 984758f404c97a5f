//! Traffic shaping policies: how a flow rule turns metrics into a verdict.

/// Direct calculator and reject checker
pub mod default;
/// Throttling checker
pub mod throttling;
/// Warm up calculator
pub mod warm_up;

pub use default::*;
pub use throttling::*;
pub use warm_up::*;

use super::{MetricType, Rule, WARM_UP_COLD_FACTOR};
use crate::base::{BlockType, StatNode, TokenResult};
use std::sync::Arc;

/// A `Calculator` derives the actual allowed threshold from the rule's
/// configured threshold and the shaping strategy.
pub trait Calculator: Send + Sync + std::fmt::Debug {
    fn calculate_allowed_threshold(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
    ) -> f64;
}

/// A `Checker` compares current metrics against the allowed threshold and
/// yields the token result.
pub trait Checker: Send + Sync + std::fmt::Debug {
    fn do_check(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
        threshold: f64,
    ) -> TokenResult;
}

/// Controller pairs one rule with its calculator and checker. Controllers
/// read the statistic node selected for the entry, they do not own stats.
#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    calculator: Arc<dyn Calculator>,
    checker: Arc<dyn Checker>,
}

impl Controller {
    pub fn new(rule: Arc<Rule>, calculator: Arc<dyn Calculator>, checker: Arc<dyn Checker>) -> Self {
        Controller {
            rule,
            calculator,
            checker,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn perform_checking(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
    ) -> TokenResult {
        if self.rule.metric_type == MetricType::Concurrency {
            return self.check_concurrency(stat_node, batch_count);
        }
        let allowed_threshold =
            self.calculator
                .calculate_allowed_threshold(stat_node.clone(), batch_count, flag);
        self.checker
            .do_check(stat_node, batch_count, flag, allowed_threshold)
    }

    fn check_concurrency(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
    ) -> TokenResult {
        let node = match stat_node {
            Some(node) => node,
            None => return TokenResult::new_pass(),
        };
        let cur = node.current_concurrency() as f64;
        if cur + batch_count as f64 > self.rule.threshold {
            TokenResult::new_blocked_with_cause(
                BlockType::Flow,
                "flow concurrency check blocked".into(),
                self.rule.clone(),
                Arc::new(cur),
            )
        } else {
            TokenResult::new_pass()
        }
    }
}
