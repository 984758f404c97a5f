//! Throttling spaces requests evenly over the statistic interval, letting
//! pending requests wait in a virtual queue until capacity frees up.

use super::{Checker, Rule};
use crate::base::{BlockType, StatNode, TokenResult, DEFAULT_INTERVAL_MS};
use crate::utils;
use std::convert::TryInto;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

static BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked";

#[derive(Debug)]
pub struct ThrottlingChecker {
    rule: Arc<Rule>,
    max_queueing_time_ns: i64,
    stat_interval_ns: i64,
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let stat_interval_ns = utils::milli2nano(DEFAULT_INTERVAL_MS).try_into().unwrap();
        ThrottlingChecker {
            max_queueing_time_ns: utils::milli2nano(rule.max_queueing_time_ms)
                .try_into()
                .unwrap(),
            stat_interval_ns,
            last_passed_time: AtomicI64::new(0),
            rule,
        }
    }

    fn blocked(&self, snapshot: f64) -> TokenResult {
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            BLOCK_MSG_QUEUEING.into(),
            self.rule.clone(),
            Arc::new(snapshot),
        )
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(
        &self,
        _stat_node: Option<Arc<dyn StatNode>>,
        batch_count: u32,
        _flag: i32,
        threshold: f64,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        if threshold <= 0.0 {
            return self.blocked(threshold);
        }
        let batch_count = batch_count as f64;
        if batch_count > threshold {
            return TokenResult::new_blocked(BlockType::Flow);
        }

        // nanoseconds give enough resolution when the per-request interval
        // drops below a millisecond
        let curr_nano: i64 = utils::curr_time_nanos().try_into().unwrap();

        // interval between two admitted batches
        let interval_ns = (batch_count.ceil() / threshold * (self.stat_interval_ns as f64)) as i64;

        let loaded_last_passed_time = self.last_passed_time.load(Ordering::SeqCst);
        // expected pass time of this request
        let expected_time = loaded_last_passed_time + interval_ns;
        if expected_time <= curr_nano
            && self
                .last_passed_time
                .compare_exchange(
                    loaded_last_passed_time,
                    curr_nano,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
        {
            return TokenResult::new_pass();
        }
        let estimated_queue_duration =
            self.last_passed_time.load(Ordering::SeqCst) + interval_ns - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            return self.blocked(estimated_queue_duration as f64);
        }
        // claim a slot in the virtual queue, then re-validate the wait
        let expected_time = self
            .last_passed_time
            .fetch_add(interval_ns, Ordering::SeqCst)
            + interval_ns;
        let estimated_queue_duration = expected_time - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            self.last_passed_time
                .fetch_sub(interval_ns, Ordering::SeqCst);
            return self.blocked(estimated_queue_duration as f64);
        }
        if estimated_queue_duration > 0 {
            TokenResult::new_should_wait(estimated_queue_duration.try_into().unwrap())
        } else {
            TokenResult::new_should_wait(0)
        }
    }
}
