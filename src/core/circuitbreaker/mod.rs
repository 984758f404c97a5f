//! The `circuitbreaker` module implements the circuit breaker pattern, cutting
//! off calls to a resource that keeps failing instead of piling load onto it.
//!
//! Three built-in strategies watch a sliding outcome window:
//!
//!  1. `SlowRequestRatio`: the ratio of slow requests (round trip above
//!     `max_allowed_rt_ms`) exceeds the threshold. Requires `max_allowed_rt_ms`.
//!  2. `ErrorRatio`: the ratio of failed requests exceeds the threshold.
//!  3. `ErrorCount`: the number of failed requests exceeds the threshold.
//!
//! Each circuit breaking rule becomes one `CircuitBreaker` with its own
//! statistic. The breaker is a state machine with three states:
//!
//!  1. Closed: all entries pass.
//!  2. Open: all entries are blocked. After `retry_timeout_ms` the breaker
//!     turns half-open and admits one probe request.
//!  3. HalfOpen: a probe is in flight, everything else is blocked. A
//!     successful probe closes the breaker, a failed or blocked one reopens it.
//!
//! State transitions can be observed through the `StateChangeListener` trait.

pub mod breaker;
pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod stat_slot;

pub use breaker::*;
pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use stat_slot::*;
