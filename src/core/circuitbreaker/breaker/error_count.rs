use super::*;
use crate::logging;
use std::sync::Arc;

#[derive(Debug)]
pub struct ErrorCountBreaker {
    breaker: BreakerBase,
    min_request_amount: u64,
    error_count_threshold: u64,
    // stat may outlive this breaker on rule reloads, so we take Arc
    stat: Arc<CounterLeapArray>,
}

impl ErrorCountBreaker {
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
            min_request_amount: rule.min_request_amount,
            error_count_threshold: rule.threshold as u64,
            breaker: BreakerBase::new(rule),
            stat,
        }
    }
}

impl CircuitBreakerTrait for ErrorCountBreaker {
    fn breaker(&self) -> &BreakerBase {
        &self.breaker
    }

    fn stat(&self) -> &Arc<CounterLeapArray> {
        &self.stat
    }

    fn on_request_complete(&self, _rt: u64, err: &Option<Error>) {
        if self.stat.record(err.is_some()).is_err() {
            logging::error!("Fail to get current counter in ErrorCountBreaker#on_request_complete(). rule: {:?}", self.breaker.bound_rule());
            return;
        }
        let (error_count, total_count) = self.stat.window_totals();

        // handle state changes when threshold exceeded
        match self.current_state() {
            State::HalfOpen => {
                if err.is_none() {
                    self.breaker.from_half_open_to_closed();
                    self.reset_metric();
                } else {
                    self.breaker.from_half_open_to_open(Arc::new(1));
                }
            }
            State::Closed => {
                if total_count >= self.min_request_amount
                    && error_count >= self.error_count_threshold
                {
                    self.breaker.from_closed_to_open(Arc::new(error_count));
                }
            }
            State::Open => {}
        }
    }
}
