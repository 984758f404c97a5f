//! Sliding window internals: the bucket ring, per-bucket counters and
//! the read-only window views layered on top of them.

mod bucket_leap_array;
mod leap_array;
mod metric_bucket;
mod sliding_window_metric;

pub(crate) use bucket_leap_array::*;
pub(crate) use leap_array::*;
pub(crate) use metric_bucket::*;
pub(crate) use sliding_window_metric::*;
