use super::{Calculator, Checker, MetricType, Rule};
use crate::base::{
    BlockType, MetricEvent, RampartInput, StatNode, TokenResult, DEFAULT_INTERVAL_MS,
};
use crate::utils;
use std::convert::TryInto;
use std::sync::Arc;

/// Provide the configured threshold as-is.
#[derive(Debug)]
pub struct DirectCalculator {
    threshold: f64,
}

impl DirectCalculator {
    pub fn new(rule: Arc<Rule>) -> Self {
        DirectCalculator {
            threshold: rule.threshold,
        }
    }
}

impl Calculator for DirectCalculator {
    fn calculate_allowed_threshold(
        &self,
        _stat_node: Option<Arc<dyn StatNode>>,
        _batch_count: u32,
        _flag: i32,
    ) -> f64 {
        self.threshold
    }
}

/// Reject overflowing requests. Prioritized QPS requests may instead borrow
/// from the next window, waiting for it at most `max_queueing_time_ms`.
#[derive(Debug)]
pub struct RejectChecker {
    rule: Arc<Rule>,
}

impl RejectChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        RejectChecker { rule }
    }
}

impl Checker for RejectChecker {
    fn do_check(
        &self,
        stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        flag: i32,
        threshold: f64,
    ) -> TokenResult {
        let node = match stat_node {
            Some(node) => node,
            None => return TokenResult::new_pass(),
        };
        let cur_count = node.sum(MetricEvent::Pass) as f64;
        if cur_count + batch_count as f64 <= threshold {
            return TokenResult::new_pass();
        }
        let input = RampartInput::new(batch_count, flag);
        if input.is_prioritized()
            && self.rule.metric_type == MetricType::QPS
            && self.rule.max_queueing_time_ms > 0
        {
            // borrow tokens from the next window if it starts soon enough
            let now = utils::curr_time_millis();
            let interval = DEFAULT_INTERVAL_MS as u64;
            let wait_ms = interval - now % interval;
            if wait_ms <= self.rule.max_queueing_time_ms as u64 {
                return TokenResult::new_should_wait(
                    utils::milli2nano(wait_ms as u32).try_into().unwrap_or(0),
                );
            }
        }
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            "flow reject check blocked".into(),
            self.rule.clone(),
            Arc::new(cur_count),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockStatNode;
    use crate::base::FLAG_PRIORITIZED;

    #[test]
    fn reject_over_threshold() {
        let rule = Arc::new(Rule {
            resource: "abc".into(),
            threshold: 10.0,
            ..Default::default()
        });
        let checker = RejectChecker::new(rule);

        let mut node = MockStatNode::new();
        node.expect_sum().return_const(10u64);
        let res = checker.do_check(Some(Arc::new(node)), 1, 0, 10.0);
        assert!(res.is_blocked());

        let mut node = MockStatNode::new();
        node.expect_sum().return_const(9u64);
        let res = checker.do_check(Some(Arc::new(node)), 1, 0, 10.0);
        assert!(res.is_pass());
    }

    #[test]
    fn prioritized_waits() {
        let rule = Arc::new(Rule {
            resource: "abc".into(),
            threshold: 10.0,
            max_queueing_time_ms: 1000,
            ..Default::default()
        });
        let checker = RejectChecker::new(rule);
        let mut node = MockStatNode::new();
        node.expect_sum().return_const(10u64);
        let res = checker.do_check(Some(Arc::new(node)), 1, FLAG_PRIORITIZED, 10.0);
        assert!(res.is_wait());
    }
}
