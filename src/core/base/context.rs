//! Context
//!
use super::{ClusterNodePtr, EntryWeakPtr, ResourceWrapper, StatNode, TokenResult};
use super::{DEFAULT_CONTEXT_NAME, FLAG_PRIORITIZED};
use crate::utils::time::curr_time_millis;
use crate::Error;
use std::sync::Arc;
use std::sync::RwLock;

pub type ContextPtr = Arc<RwLock<EntryContext>>;

/// EntryContext carries everything one admission needs: the resource, the
/// caller identity, the stat nodes selected by the prepare slots and the
/// result of the rule check slots.
#[derive(Default)]
pub struct EntryContext {
    /// entry<->context is a cycled reference, so the context keeps a Weak
    entry: Option<EntryWeakPtr>,
    /// Use to calculate RT
    start_time: u64,
    /// The round trip time of this transaction
    round_trip: u64,
    resource: ResourceWrapper,
    /// name of the call context this entry belongs to
    ctx_name: String,
    /// identity of the caller, may be empty
    origin: String,
    /// the per-context stat node selected by the node selector slot
    stat_node: Option<Arc<dyn StatNode>>,
    /// the resource level node attached by the cluster builder slot
    cluster_node: Option<ClusterNodePtr>,
    /// the per-origin node, present only when origin is non-empty
    origin_node: Option<Arc<dyn StatNode>>,
    input: RampartInput,
    /// the result of rule slots check
    rule_check_result: TokenResult,
    /// set when the context name cache is full, the entry then passes
    /// without rule checks or statistics
    untracked: bool,
    err: Option<Error>,
}

impl EntryContext {
    pub fn new() -> Self {
        EntryContext {
            start_time: curr_time_millis(),
            ctx_name: DEFAULT_CONTEXT_NAME.into(),
            ..Default::default()
        }
    }

    pub fn set_entry(&mut self, entry: EntryWeakPtr) {
        self.entry = Some(entry);
    }

    pub fn entry(&self) -> Option<&EntryWeakPtr> {
        self.entry.as_ref()
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn is_blocked(&self) -> bool {
        self.rule_check_result.is_blocked()
    }

    pub fn set_round_trip(&mut self, round_trip: u64) {
        self.round_trip = round_trip
    }

    pub fn round_trip(&self) -> u64 {
        self.round_trip
    }

    pub fn set_resource(&mut self, resource: ResourceWrapper) {
        self.resource = resource;
    }

    pub fn resource(&self) -> &ResourceWrapper {
        &self.resource
    }

    pub fn set_ctx_name(&mut self, ctx_name: String) {
        self.ctx_name = ctx_name;
    }

    pub fn ctx_name(&self) -> &String {
        &self.ctx_name
    }

    pub fn set_origin(&mut self, origin: String) {
        self.origin = origin;
    }

    pub fn origin(&self) -> &String {
        &self.origin
    }

    pub fn set_input(&mut self, input: RampartInput) {
        self.input = input;
    }

    pub fn input(&self) -> &RampartInput {
        &self.input
    }

    pub fn set_stat_node(&mut self, stat_node: Arc<dyn StatNode>) {
        self.stat_node = Some(stat_node);
    }

    pub fn stat_node(&self) -> Option<Arc<dyn StatNode>> {
        self.stat_node.clone()
    }

    pub fn set_cluster_node(&mut self, node: ClusterNodePtr) {
        self.cluster_node = Some(node);
    }

    pub fn cluster_node(&self) -> Option<ClusterNodePtr> {
        self.cluster_node.clone()
    }

    pub fn set_origin_node(&mut self, node: Arc<dyn StatNode>) {
        self.origin_node = Some(node);
    }

    pub fn origin_node(&self) -> Option<Arc<dyn StatNode>> {
        self.origin_node.clone()
    }

    pub fn set_result(&mut self, result: TokenResult) {
        self.rule_check_result = result;
    }

    pub fn reset_result_to_pass(&mut self) {
        self.rule_check_result.reset_to_pass();
    }

    pub fn result(&self) -> &TokenResult {
        &self.rule_check_result
    }

    pub fn set_untracked(&mut self) {
        self.untracked = true;
    }

    pub fn is_untracked(&self) -> bool {
        self.untracked
    }

    pub fn set_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    pub fn get_err(&self) -> &Option<Error> {
        &self.err
    }
}

/// Input of admission checking algorithms
#[derive(Debug)]
pub struct RampartInput {
    batch_count: u32,
    flag: i32,
    /// caller-supplied invocation arguments, opaque to the built-in slots
    args: Option<Vec<String>>,
}

impl Default for RampartInput {
    fn default() -> Self {
        RampartInput {
            batch_count: 1,
            flag: 0,
            args: None,
        }
    }
}

impl RampartInput {
    pub fn new(batch_count: u32, flag: i32) -> Self {
        RampartInput {
            batch_count,
            flag,
            args: None,
        }
    }

    pub fn set_batch_count(&mut self, batch_count: u32) {
        self.batch_count = batch_count;
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn set_flag(&mut self, flag: i32) {
        self.flag = flag;
    }

    pub fn flag(&self) -> i32 {
        self.flag
    }

    pub fn is_prioritized(&self) -> bool {
        self.flag & FLAG_PRIORITIZED != 0
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = Some(args);
    }

    pub fn args(&self) -> Option<&Vec<String>> {
        self.args.as_ref()
    }
}
