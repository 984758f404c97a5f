use crate::base::{MetricEvent, DEFAULT_STATISTIC_MAX_RT};
use enum_map::EnumMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Bucket payloads live in a shared ring, so they carry interior mutability
/// through atomics rather than a lock around the array.
pub trait MetricTrait: fmt::Debug + Default + Send + Sync {
    fn reset(&self);
}

/// One bucket worth of event counters: a counter per `MetricEvent`, the
/// smallest round trip seen and the concurrency high-water mark.
#[derive(Debug)]
pub struct MetricBucket {
    counters: EnumMap<MetricEvent, AtomicU64>,
    min_rt: AtomicU64,
    max_concurrency: AtomicU32,
}

impl Default for MetricBucket {
    fn default() -> Self {
        MetricBucket {
            counters: EnumMap::default(),
            min_rt: AtomicU64::new(DEFAULT_STATISTIC_MAX_RT),
            max_concurrency: AtomicU32::new(0),
        }
    }
}

impl MetricTrait for MetricBucket {
    fn reset(&self) {
        for (_, counter) in &self.counters {
            counter.store(0, Ordering::SeqCst);
        }
        self.min_rt
            .store(DEFAULT_STATISTIC_MAX_RT, Ordering::SeqCst);
        self.max_concurrency.store(0, Ordering::SeqCst);
    }
}

impl MetricBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` occurrences of `event`. A round trip event also
    /// refreshes the minimum.
    pub fn add(&self, event: MetricEvent, count: u64) {
        match event {
            MetricEvent::Rt => self.add_rt(count),
            _ => self.add_count(event, count),
        }
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.counters[event].fetch_add(count, Ordering::SeqCst);
    }

    pub fn add_rt(&self, round_trip: u64) {
        self.add_count(MetricEvent::Rt, round_trip);
        self.min_rt.fetch_min(round_trip, Ordering::SeqCst);
    }

    pub fn get(&self, event: MetricEvent) -> u64 {
        self.counters[event].load(Ordering::SeqCst)
    }

    pub fn min_rt(&self) -> u64 {
        self.min_rt.load(Ordering::SeqCst)
    }

    pub fn update_concurrency(&self, concurrency: u32) {
        self.max_concurrency.fetch_max(concurrency, Ordering::SeqCst);
    }

    pub fn max_concurrency(&self) -> u32 {
        self.max_concurrency.load(Ordering::SeqCst)
    }
}
