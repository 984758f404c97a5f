use super::{BucketLeapArray, BucketWrap, MetricBucket};
use crate::base::{
    check_validity_for_reuse_statistic, MetricEvent, ReadStat, DEFAULT_STATISTIC_MAX_RT,
};
use crate::utils::curr_time_millis;
use crate::Result;
use std::sync::Arc;

/// A read-only window over a shared [`BucketLeapArray`].
///
/// The array is the single writable store for a resource; any number of
/// views with coarser `sample_count`/`interval_ms` pairs may be layered on
/// top of it, each aggregating a different span of the same buckets.
#[derive(Debug)]
pub struct SlidingWindowMetric {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    inner: Arc<BucketLeapArray>,
}

impl SlidingWindowMetric {
    pub fn new(sample_count: u32, interval_ms: u32, inner: Arc<BucketLeapArray>) -> Result<Self> {
        check_validity_for_reuse_statistic(
            sample_count,
            interval_ms,
            inner.sample_count(),
            inner.interval_ms(),
        )?;
        Ok(SlidingWindowMetric {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            inner,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_ms as f64 / 1000.0
    }

    /// Inclusive range of inner bucket start stamps this view covers at `t_ms`.
    /// The wall-clock span is [start, end + inner bucket length).
    pub(crate) fn bucket_start_range(&self, t_ms: u64) -> (u64, u64) {
        let end = self.inner.calculate_start_stamp(t_ms);
        let start = end + self.inner.bucket_len_ms() as u64 - self.interval_ms as u64;
        (start, end)
    }

    pub(crate) fn satisfied_buckets(&self, now: u64) -> Vec<Arc<BucketWrap<MetricBucket>>> {
        let (start, end) = self.bucket_start_range(now);
        self.inner
            .get_valid_values_conditional(now, &move |curr: u64| start <= curr && curr <= end)
    }

    pub fn sum_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.satisfied_buckets(now)
            .iter()
            .map(|b| b.value().get(event))
            .sum()
    }

    pub fn qps_with_time(&self, now: u64, event: MetricEvent) -> f64 {
        self.sum_with_time(now, event) as f64 / self.interval_s()
    }

    pub fn max_of_single_bucket(&self, event: MetricEvent) -> u64 {
        self.satisfied_buckets(curr_time_millis())
            .iter()
            .map(|b| b.value().get(event))
            .max()
            .unwrap_or(0)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.satisfied_buckets(curr_time_millis())
            .iter()
            .map(|b| b.value().max_concurrency())
            .max()
            .unwrap_or(0)
    }
}

impl ReadStat for SlidingWindowMetric {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis(), event)
    }

    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.qps_with_time(curr_time_millis() - self.bucket_len_ms as u64, event)
    }

    fn sum(&self, event: MetricEvent) -> u64 {
        self.sum_with_time(curr_time_millis(), event)
    }

    fn avg_rt(&self) -> f64 {
        match self.sum(MetricEvent::Complete) {
            0 => 0f64,
            completed => self.sum(MetricEvent::Rt) as f64 / completed as f64,
        }
    }

    fn min_rt(&self) -> f64 {
        self.satisfied_buckets(curr_time_millis())
            .iter()
            .map(|b| b.value().min_rt())
            .min()
            .unwrap_or(DEFAULT_STATISTIC_MAX_RT) as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::WriteStat;

    const INNER_SAMPLES: u32 = 20;
    const INNER_INTERVAL_MS: u32 = 10000;

    fn shared_array() -> Arc<BucketLeapArray> {
        Arc::new(BucketLeapArray::new(INNER_SAMPLES, INNER_INTERVAL_MS).unwrap())
    }

    #[test]
    fn view_parameters_are_validated() {
        // (sample_count, interval_ms, accepted)
        let cases = [
            (4, 2000, true),
            (0, 0, false),
            (4, 2001, false),   // interval not divisible by sample count
            (2, 2002, false),   // bucket not a multiple of the inner bucket
            (4, 200000, false), // wider than the inner array
        ];
        for (sample_count, interval_ms, accepted) in cases {
            let got = SlidingWindowMetric::new(sample_count, interval_ms, shared_array());
            assert_eq!(got.is_ok(), accepted, "({sample_count}, {interval_ms})");
        }
    }

    #[test]
    fn covered_start_stamps() {
        // (sample_count, interval_ms, inner_samples, inner_interval_ms, now, start, end)
        let cases = [
            (4, 2000, 20, 10000, 1700000000123, 1699999998500, 1700000000000),
            (2, 1000, 20, 10000, 1700000000700, 1700000000000, 1700000000500),
            (1, 5000, 10, 10000, 1700000004999, 1700000000000, 1700000004000),
            // `now` sitting exactly on a bucket boundary
            (2, 1000, 20, 10000, 1700000000500, 1700000000000, 1700000000500),
        ];
        for (samples, interval, inner_samples, inner_interval, now, start, end) in cases {
            let inner = Arc::new(BucketLeapArray::new(inner_samples, inner_interval).unwrap());
            let view = SlidingWindowMetric::new(samples, interval, inner).unwrap();
            assert_eq!(view.bucket_start_range(now), (start, end));
        }
    }

    #[test]
    fn sum_only_counts_covered_buckets() {
        let arr = shared_array();
        let now = 1700000001999u64;
        // the 2000ms view at `now` spans inner start stamps
        // 1700000000000..=1700000001500
        for offset in [0u64, 500, 1000, 1500] {
            arr.add_count_with_time(1700000000000 + offset, MetricEvent::Pass, 5)
                .unwrap();
        }
        // one bucket just before the window
        arr.add_count_with_time(1699999999900, MetricEvent::Pass, 7)
            .unwrap();
        let view = SlidingWindowMetric::new(2, 2000, arr).unwrap();
        assert_eq!(view.sum_with_time(now, MetricEvent::Pass), 20);
        assert!((view.qps_with_time(now, MetricEvent::Pass) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_bucket_peak() {
        let arr = shared_array();
        let view = SlidingWindowMetric::new(2, 2000, arr.clone()).unwrap();
        arr.add_count(MetricEvent::Pass, 100);
        assert_eq!(view.max_of_single_bucket(MetricEvent::Pass), 100);
    }

    #[test]
    fn min_rt_defaults_when_idle() {
        let view = SlidingWindowMetric::new(2, 2000, shared_array()).unwrap();
        assert!((view.min_rt() - DEFAULT_STATISTIC_MAX_RT as f64).abs() < f64::EPSILON);
    }

    #[test]
    fn concurrency_peak_across_buckets() {
        let arr = shared_array();
        let view = SlidingWindowMetric::new(4, 2000, arr.clone()).unwrap();
        for c in [1, 3, 2] {
            arr.update_concurrency(c);
        }
        assert_eq!(view.max_concurrency(), 3);
    }

    #[test]
    fn average_rt_over_completions() {
        let arr = shared_array();
        let view = SlidingWindowMetric::new(4, 2000, arr.clone()).unwrap();
        arr.add_count(MetricEvent::Rt, 300);
        arr.add_count(MetricEvent::Complete, 100);
        assert!((view.avg_rt() - 3.0).abs() < f64::EPSILON);
    }
}
