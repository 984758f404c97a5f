use super::{LeapArray, MetricBucket};
use crate::base::{MetricEvent, WriteStat, DEFAULT_STATISTIC_MAX_RT};
use crate::utils::curr_time_millis;
use crate::Result;

/// The ring every statistic node writes into: a `LeapArray` whose buckets
/// hold event counters.
pub type BucketLeapArray = LeapArray<MetricBucket>;

impl WriteStat for BucketLeapArray {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.add_count_with_time(curr_time_millis(), event, count)
            .unwrap();
    }

    fn update_concurrency(&self, concurrency: u32) {
        self.update_concurrency_with_time(curr_time_millis(), concurrency)
            .unwrap();
    }
}

impl BucketLeapArray {
    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        self.get_bucket_of_time(now)?.value().add(event, count);
        Ok(())
    }

    pub fn update_concurrency_with_time(&self, now: u64, concurrency: u32) -> Result<()> {
        self.get_bucket_of_time(now)?
            .value()
            .update_concurrency(concurrency);
        Ok(())
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.get_valid_values(now)
            .iter()
            .map(|b| b.value().get(event))
            .sum()
    }

    pub fn min_rt(&self) -> u64 {
        self.get_current_values()
            .iter()
            .map(|b| b.value().min_rt())
            .min()
            .unwrap_or(DEFAULT_STATISTIC_MAX_RT)
    }

    pub fn max_concurrency(&self) -> u32 {
        self.get_current_values()
            .iter()
            .map(|b| b.value().max_concurrency())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const SAMPLE_COUNT: u32 = 20;
    const BUCKET_LEN_MS: u32 = 500;
    const INTERVAL_MS: u32 = BUCKET_LEN_MS * SAMPLE_COUNT;

    #[test]
    fn stale_bucket_resets_cleanly() {
        let arr = BucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let idx = SAMPLE_COUNT as usize - 1;
        arr.array[idx].value().add(MetricEvent::Block, 100);
        let fresh_start = curr_time_millis() + 1000;
        arr.reset_bucket(idx, fresh_start);
        assert_eq!(arr.array[idx].value().get(MetricEvent::Block), 0);
        assert_eq!(arr.array[idx].start_stamp(), fresh_start);
    }

    #[test]
    fn counts_roll_up_across_buckets() {
        let arr = BucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        arr.add_count(MetricEvent::Pass, 3);
        arr.add_count(MetricEvent::Block, 1);
        assert_eq!(arr.count(MetricEvent::Pass), 3);
        assert_eq!(arr.count(MetricEvent::Block), 1);
        assert_eq!(arr.count(MetricEvent::Complete), 0);
    }

    #[test]
    fn min_rt_and_max_concurrency() {
        let arr = BucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        assert_eq!(arr.min_rt(), DEFAULT_STATISTIC_MAX_RT);
        assert_eq!(arr.max_concurrency(), 0);
        arr.add_count(MetricEvent::Rt, 100);
        arr.update_concurrency(2);
        arr.update_concurrency(5);
        assert_eq!(arr.min_rt(), 100);
        assert_eq!(arr.max_concurrency(), 5);
    }

    #[test]
    fn every_bucket_of_a_full_interval_is_hit() {
        let arr = BucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let base = 1976296040000u64;
        let mut t = base;
        while t < base + INTERVAL_MS as u64 {
            arr.add_count_with_time(t, MetricEvent::Pass, 1).unwrap();
            arr.add_count_with_time(t, MetricEvent::Rt, 10).unwrap();
            t += BUCKET_LEN_MS as u64;
        }
        let cutoff = base + INTERVAL_MS as u64 - 1;
        for b in arr.get_valid_values(cutoff) {
            assert_eq!(b.value().get(MetricEvent::Pass), 1);
            assert_eq!(b.value().get(MetricEvent::Rt), 10);
        }
        assert_eq!(arr.count_with_time(cutoff, MetricEvent::Pass), 20);
        assert_eq!(arr.count_with_time(cutoff, MetricEvent::Rt), 200);
    }

    #[test]
    fn concurrent_writers_agree_on_totals() {
        let arr = Arc::new(BucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap());
        let base = 1976296040000u64;
        let mut handles = Vec::new();
        for _ in 0..3000 {
            handles.push(thread::spawn({
                let arr = arr.clone();
                move || {
                    let offset = rand::random::<u64>() % INTERVAL_MS as u64;
                    arr.add_count_with_time(base + offset, MetricEvent::Pass, 1)
                        .unwrap();
                    arr.add_count_with_time(base + offset, MetricEvent::Rt, 10)
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let cutoff = base + INTERVAL_MS as u64 - 1;
        assert_eq!(arr.count_with_time(cutoff, MetricEvent::Pass), 3000);
        assert_eq!(arr.count_with_time(cutoff, MetricEvent::Rt), 30000);
    }
}
