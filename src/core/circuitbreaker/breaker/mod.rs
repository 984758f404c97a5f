//! Circuit breaker state machine:
//!
//! ```text
//!                      switch to open based on rule
//!     +--------------------------------------------------------+
//!     |                                                        v
//! +--------+  probe succeed  +----------+      probe      +--------+
//! |        |<----------------|          |<----------------|        |
//! | Closed |                 | HalfOpen |                 |  Open  |
//! |        |                 |          |  probe failed   |        |
//! +--------+                 +----------+---------------->+--------+
//! ```

/// Error count
pub mod error_count;
/// Error ratio
pub mod error_ratio;
/// Slow round trip time
pub mod slow_request;
pub mod stat;

pub use error_count::*;
pub use error_ratio::*;
pub use slow_request::*;
pub use stat::*;

use super::*;
use crate::{
    base::{ContextPtr, EntryContext, RampartEntry, Snapshot},
    logging,
    stat::MetricTrait,
    utils, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

/// `BreakerStrategy` represents the strategy of circuit breaker.
/// Each strategy is associated with one rule type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
pub enum BreakerStrategy {
    /// `SlowRequestRatio` trips the breaker when the ratio of slow requests
    /// (round trip above `max_allowed_rt_ms`) exceeds the threshold
    #[default]
    SlowRequestRatio,
    /// `ErrorRatio` trips the breaker when the ratio of failed requests exceeds the threshold
    ErrorRatio,
    /// `ErrorCount` trips the breaker when the number of failed requests exceeds the threshold
    ErrorCount,
    Custom(u8),
}

/// States of the circuit breaker state machine
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum State {
    #[default]
    Closed,
    HalfOpen,
    Open,
}

/// `StateChangeListener` listens on the circuit breaker state change events.
/// The rule argument is a copy of the breaker's rule, changes to it do not
/// take effect for the breaker.
pub trait StateChangeListener: Sync + Send {
    /// `on_transform_to_closed` is triggered when the breaker state transformed to Closed.
    fn on_transform_to_closed(&self, prev: State, rule: Arc<Rule>);

    /// `on_transform_to_open` is triggered when the breaker state transformed to Open.
    /// The snapshot indicates the triggering value at the time of the transformation.
    fn on_transform_to_open(&self, prev: State, rule: Arc<Rule>, snapshot: Option<Arc<Snapshot>>);

    /// `on_transform_to_half_open` is triggered when the breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, rule: Arc<Rule>);
}

/// `CircuitBreakerTrait` is the basic trait of circuit breakers. Concrete
/// breakers supply the shared `BreakerBase`, their statistic and the outcome
/// handling, the state machine plumbing comes with the trait.
pub trait CircuitBreakerTrait: Send + Sync {
    /// `breaker` returns the associated inner breaker.
    fn breaker(&self) -> &BreakerBase;

    /// `stat` returns the associated statistic data structure.
    fn stat(&self) -> &Arc<CounterLeapArray>;

    /// `try_pass` acquires permission for an invocation, driving the state
    /// machine of the circuit breaker.
    fn try_pass(&self, ctx: &EntryContext) -> bool {
        match self.current_state() {
            State::Closed => true,
            State::Open => {
                self.breaker().retry_timeout_arrived() && self.breaker().from_open_to_half_open(ctx)
            }
            State::HalfOpen => false,
        }
    }

    #[inline]
    fn next_retry_timestamp_ms(&self) -> u64 {
        self.breaker()
            .next_retry_timestamp_ms
            .load(Ordering::SeqCst)
    }

    /// `bound_rule` returns the associated circuit breaking rule.
    #[inline]
    fn bound_rule(&self) -> &Arc<Rule> {
        self.breaker().bound_rule()
    }

    #[inline]
    fn set_state(&self, state: State) {
        self.breaker().set_state(state);
    }

    /// `current_state` returns the current state of the circuit breaker.
    #[inline]
    fn current_state(&self) -> State {
        self.breaker().current_state()
    }

    /// `on_request_complete` records a completed request with the given response time and
    /// error (if present), and handles the state transformation of the circuit breaker.
    /// `on_request_complete` is called only when a passed invocation finished.
    fn on_request_complete(&self, rt: u64, error: &Option<Error>);

    /// the underlying metric carries inner mutability, thus `&self`
    fn reset_metric(&self) {
        for c in self.stat().all_counter() {
            c.value().reset()
        }
    }

    /// See doc for `BreakerBase`
    #[inline]
    fn from_closed_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.breaker().from_closed_to_open(snapshot)
    }

    #[inline]
    fn from_open_to_half_open(&self, ctx: &EntryContext) -> bool {
        self.breaker().from_open_to_half_open(ctx)
    }

    #[inline]
    fn from_half_open_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.breaker().from_half_open_to_open(snapshot)
    }

    #[inline]
    fn from_half_open_to_closed(&self) -> bool {
        self.breaker().from_half_open_to_closed()
    }
}

/// BreakerBase encompasses the common fields of circuit breakers.
#[derive(Debug)]
pub struct BreakerBase {
    rule: Arc<Rule>,
    /// `retry_timeout_ms` represents the recovery timeout (in milliseconds) before
    /// the circuit breaker leaves the open state
    retry_timeout_ms: u32,
    /// `next_retry_timestamp_ms` is the earliest time the circuit breaker may probe
    next_retry_timestamp_ms: AtomicU64,
    /// the state machine of the circuit breaker
    state: Arc<Mutex<State>>,
}

impl BreakerBase {
    pub fn new(rule: Arc<Rule>) -> Self {
        let retry_timeout_ms = rule.retry_timeout_ms;
        BreakerBase {
            rule,
            retry_timeout_ms,
            next_retry_timestamp_ms: AtomicU64::new(0),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn bound_rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn set_state(&self, state: State) {
        *self.state.lock().unwrap() = state;
    }

    pub fn current_state(&self) -> State {
        *self.state.lock().unwrap()
    }

    pub fn retry_timeout_arrived(&self) -> bool {
        utils::curr_time_millis() >= self.next_retry_timestamp_ms.load(Ordering::SeqCst)
    }

    pub fn update_next_retry_timestamp(&self) {
        self.next_retry_timestamp_ms.store(
            utils::curr_time_millis() + self.retry_timeout_ms as u64,
            Ordering::SeqCst,
        );
    }

    /// Moves the machine from `from` to `to` and notifies the registered
    /// listeners, all under the state lock. Returns false when another
    /// caller already moved the machine away from `from`.
    fn transition(
        &self,
        from: State,
        to: State,
        arm_retry: bool,
        notify: &dyn Fn(&dyn StateChangeListener),
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != from {
            return false;
        }
        *state = to;
        if arm_retry {
            self.update_next_retry_timestamp();
        }
        for listener in state_change_listeners().lock().unwrap().iter() {
            notify(listener.as_ref());
        }
        true
    }

    /// Returns true only if the caller accomplished the transformation.
    pub fn from_closed_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.transition(State::Closed, State::Open, true, &|l| {
            l.on_transform_to_open(
                State::Closed,
                Arc::clone(&self.rule),
                Some(Arc::clone(&snapshot)),
            )
        })
    }

    /// Starts a half-open probe. The current entry gets an exit hook that
    /// reopens the breaker if the probe itself ends up blocked.
    /// Returns true only if the caller accomplished the transformation.
    pub fn from_open_to_half_open(&self, ctx: &EntryContext) -> bool {
        let moved = self.transition(State::Open, State::HalfOpen, false, &|l| {
            l.on_transform_to_half_open(State::Open, Arc::clone(&self.rule))
        });
        if !moved {
            return false;
        }
        match ctx.entry().and_then(|weak| weak.upgrade()) {
            Some(entry) => {
                let rule = Arc::clone(&self.rule);
                let state = Arc::clone(&self.state);
                entry.write().unwrap().when_exit(Box::new(
                    move |_entry: &RampartEntry, ctx: ContextPtr| -> Result<()> {
                        let mut state = state.lock().unwrap();
                        if ctx.read().unwrap().is_blocked() && *state == State::HalfOpen {
                            *state = State::Open;
                            for listener in state_change_listeners().lock().unwrap().iter() {
                                listener.on_transform_to_open(
                                    State::HalfOpen,
                                    Arc::clone(&rule),
                                    Some(Arc::new(1.0)),
                                );
                            }
                        }
                        Ok(())
                    },
                ));
            }
            None => {
                logging::error!(
                    "Entry is None in BreakerBase::from_open_to_half_open(), rule: {:?}",
                    self.rule,
                );
            }
        }
        true
    }

    /// Returns true only if the caller accomplished the transformation.
    pub fn from_half_open_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.transition(State::HalfOpen, State::Open, true, &|l| {
            l.on_transform_to_open(
                State::HalfOpen,
                Arc::clone(&self.rule),
                Some(Arc::clone(&snapshot)),
            )
        })
    }

    /// Returns true only if the caller accomplished the transformation.
    pub fn from_half_open_to_closed(&self) -> bool {
        self.transition(State::HalfOpen, State::Closed, false, &|l| {
            l.on_transform_to_closed(State::HalfOpen, Arc::clone(&self.rule))
        })
    }
}

#[cfg(test)]
pub(crate) use test::MockStateListener;
