use super::{BucketLeapArray, SlidingWindowMetric};
use crate::{
    base::{
        ConcurrencyStat, MetricEvent, ReadStat, ResourceType, StatNode, WriteStat,
    },
    config, Result,
};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, RwLock,
};

/// StatisticNode is the basic statistic unit: one sliding window array plus a
/// concurrency gauge. Cluster nodes, origin nodes and per-context default
/// nodes are all StatisticNodes.
#[derive(Debug)]
pub struct StatisticNode {
    pub(crate) res_name: String,
    pub(crate) resource_type: ResourceType,
    pub(crate) sample_count: u32,
    pub(crate) interval_ms: u32,
    pub(crate) concurrency: AtomicU32,
    pub(crate) arr: Arc<BucketLeapArray>,
    pub(crate) metric: Arc<SlidingWindowMetric>,
}

impl StatisticNode {
    pub fn new(res_name: String, resource_type: ResourceType) -> Self {
        let arr = Arc::new(
            BucketLeapArray::new(
                config::global_stat_sample_count_total(),
                config::global_stat_interval_ms_total(),
            )
            .unwrap(),
        );
        let sample_count = config::metric_stat_sample_count();
        let interval_ms = config::metric_stat_interval_ms();
        let metric =
            Arc::new(SlidingWindowMetric::new(sample_count, interval_ms, arr.clone()).unwrap());
        StatisticNode {
            res_name,
            resource_type,
            sample_count,
            interval_ms,
            concurrency: AtomicU32::new(0),
            arr,
            metric,
        }
    }

    pub fn res_name(&self) -> &str {
        &self.res_name
    }

    pub fn max_concurrency(&self) -> u32 {
        self.metric.max_concurrency()
    }
}

impl ReadStat for StatisticNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.metric.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.metric.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.metric.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.metric.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.metric.avg_rt()
    }
}

impl WriteStat for StatisticNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.arr.add_count(event, count);
    }

    fn update_concurrency(&self, concurrency: u32) {
        self.arr.update_concurrency(concurrency);
    }
}

impl ConcurrencyStat for StatisticNode {
    fn current_concurrency(&self) -> u32 {
        self.concurrency.load(Ordering::SeqCst)
    }

    fn increase_concurrency(&self) {
        self.arr
            .update_concurrency(self.concurrency.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn decrease_concurrency(&self) {
        self.concurrency.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StatNode for StatisticNode {
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        let stat = SlidingWindowMetric::new(sample_count, interval_ms, self.arr.clone())?;
        Ok(Arc::new(stat))
    }
}

/// ClusterNode aggregates all traffic of one resource and holds the
/// per-origin nodes, created lazily when a named caller shows up.
#[derive(Debug)]
pub struct ClusterNode {
    node: StatisticNode,
    origins: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ClusterNode {
    pub fn new(res_name: String, resource_type: ResourceType) -> Self {
        ClusterNode {
            node: StatisticNode::new(res_name, resource_type),
            origins: RwLock::new(HashMap::new()),
        }
    }

    pub fn res_name(&self) -> &str {
        self.node.res_name()
    }

    pub fn max_concurrency(&self) -> u32 {
        self.node.max_concurrency()
    }

    /// origin_node returns the per-origin statistic node, creating it on demand.
    pub fn origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origins.read().unwrap().get(origin) {
            return node.clone();
        }
        let mut origins = self.origins.write().unwrap();
        origins
            .entry(origin.into())
            .or_insert_with(|| {
                Arc::new(StatisticNode::new(
                    self.node.res_name.clone(),
                    self.node.resource_type,
                ))
            })
            .clone()
    }
}

impl ReadStat for ClusterNode {
    fn qps(&self, event: MetricEvent) -> f64 {
        self.node.qps(event)
    }
    fn qps_previous(&self, event: MetricEvent) -> f64 {
        self.node.qps_previous(event)
    }
    fn sum(&self, event: MetricEvent) -> u64 {
        self.node.sum(event)
    }
    fn min_rt(&self) -> f64 {
        self.node.min_rt()
    }
    fn avg_rt(&self) -> f64 {
        self.node.avg_rt()
    }
}

impl WriteStat for ClusterNode {
    fn add_count(&self, event: MetricEvent, count: u64) {
        self.node.add_count(event, count);
    }

    fn update_concurrency(&self, concurrency: u32) {
        self.node.update_concurrency(concurrency);
    }
}

impl ConcurrencyStat for ClusterNode {
    fn current_concurrency(&self) -> u32 {
        self.node.current_concurrency()
    }

    fn increase_concurrency(&self) {
        self.node.increase_concurrency()
    }

    fn decrease_concurrency(&self) {
        self.node.decrease_concurrency()
    }
}

impl StatNode for ClusterNode {
    fn generate_read_stat(&self, sample_count: u32, interval_ms: u32) -> Result<Arc<dyn ReadStat>> {
        self.node.generate_read_stat(sample_count, interval_ms)
    }
}
