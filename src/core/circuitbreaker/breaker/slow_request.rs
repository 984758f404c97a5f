use super::*;
use crate::logging;
use std::sync::Arc;

#[derive(Debug)]
pub struct SlowRtBreaker {
    breaker: BreakerBase,
    max_allowed_rt: u64,
    max_slow_request_ratio: f64,
    min_request_amount: u64,
    stat: Arc<CounterLeapArray>,
}

impl SlowRtBreaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let stat = CounterLeapArray::new(
            rule.get_rule_stat_sliding_window_bucket_count(),
            rule.stat_interval_ms,
        )
        .unwrap();
        Self::new_with_stat(rule, Arc::new(stat))
    }

    pub fn new_with_stat(rule: Arc<Rule>, stat: Arc<CounterLeapArray>) -> Self {
        Self {
            max_allowed_rt: rule.max_allowed_rt_ms,
            max_slow_request_ratio: rule.threshold,
            min_request_amount: rule.min_request_amount,
            breaker: BreakerBase::new(rule),
            stat,
        }
    }
}

impl CircuitBreakerTrait for SlowRtBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, rt: u64, _err: &Option<Error>) {
        let slow = rt > self.max_allowed_rt;
        if self.stat.record(slow).is_err() {
            logging::error!(
                "Fail to get current counter in SlowRtBreaker#on_request_complete(). rule: {:?}",
                self.breaker.bound_rule()
            );
            return;
        }
        let (slow_count, total_count) = self.stat.window_totals();
        let slow_ratio = slow_count as f64 / total_count as f64;
        // handle state changes when threshold exceeded
        match self.current_state() {
            State::HalfOpen => {
                if slow {
                    // fail to probe
                    self.breaker.from_half_open_to_open(Arc::new(1.0));
                } else {
                    // succeed to probe
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                }
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && slow_ratio >= self.max_slow_request_ratio
                {
                    self.breaker.from_closed_to_open(Arc::new(slow_ratio));
                }
            }
            State::Open => {}
        }
    }
}
