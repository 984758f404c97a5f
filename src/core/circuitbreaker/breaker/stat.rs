use crate::{
    stat::{BucketWrap, LeapArray, MetricTrait},
    Result,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Counter tracks one sliding window bucket of outcomes. `target` counts the
/// outcomes the breaker strategy watches (errors or slow requests), `total`
/// counts every completed request.
#[derive(Debug, Default)]
pub struct Counter {
    pub(crate) target: AtomicU64,
    pub(crate) total: AtomicU64,
}

impl MetricTrait for Counter {
    fn reset(&self) {
        self.target.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }
}

pub type CounterLeapArray = LeapArray<Counter>;

impl CounterLeapArray {
    pub fn current_counter(&self) -> Result<Arc<BucketWrap<Counter>>> {
        self.current_bucket()
    }

    pub fn all_counter(&self) -> Vec<Arc<BucketWrap<Counter>>> {
        self.get_current_values()
    }

    /// Records one finished request into the current bucket. `hit` marks
    /// outcomes the owning strategy watches.
    pub fn record(&self, hit: bool) -> Result<()> {
        let counter = self.current_counter()?;
        if hit {
            counter.value().target.fetch_add(1, Ordering::SeqCst);
        }
        counter.value().total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Sums `(target, total)` over the live window.
    pub fn window_totals(&self) -> (u64, u64) {
        self.all_counter().iter().fold((0, 0), |(target, total), c| {
            (
                target + c.value().target.load(Ordering::SeqCst),
                total + c.value().total.load(Ordering::SeqCst),
            )
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reset_bucket() {
        let counter = Counter {
            target: AtomicU64::new(5),
            total: AtomicU64::new(10),
        };
        counter.reset();
        assert_eq!(counter.target.load(Ordering::SeqCst), 0);
        assert_eq!(counter.total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn accumulate_and_read() {
        let stat = CounterLeapArray::new(2, 1000).unwrap();
        stat.record(true).unwrap();
        stat.record(false).unwrap();
        stat.record(false).unwrap();
        assert_eq!(stat.window_totals(), (1, 3));
    }
}
