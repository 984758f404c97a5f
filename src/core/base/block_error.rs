use super::{BlockType, RampartRule};
use crate::utils;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Value captured at the moment a rule fired, attached to the resulting
/// [`BlockError`] for diagnostics.
pub trait SnapshotTrait: Any + fmt::Debug + utils::AsAny + Send + Sync {}
impl<T: Any + fmt::Debug + utils::AsAny + Send + Sync> SnapshotTrait for T {}
pub type Snapshot = dyn SnapshotTrait;

/// An entry was denied by a rule check. Optionally carries the rule that
/// fired and the metric snapshot that tripped it.
#[derive(Debug, Clone, Default)]
pub struct BlockError {
    block_type: BlockType,
    block_msg: String,
    rule: Option<Arc<dyn RampartRule>>,
    snapshot_value: Option<Arc<Snapshot>>,
}

// Equality ignores the rule and snapshot, those are diagnostics only.
impl PartialEq for BlockError {
    fn eq(&self, other: &BlockError) -> bool {
        self.block_type == other.block_type && self.block_msg == other.block_msg
    }
}

impl BlockError {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            ..Self::default()
        }
    }

    pub fn new_with_msg(block_type: BlockType, block_msg: String) -> Self {
        Self {
            block_type,
            block_msg,
            ..Self::default()
        }
    }

    pub fn new_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn RampartRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        Self {
            block_type,
            block_msg,
            rule: Some(rule),
            snapshot_value: Some(snapshot_value),
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    pub fn block_msg(&self) -> String {
        self.block_msg.clone()
    }

    pub fn triggered_rule(&self) -> Option<Arc<dyn RampartRule>> {
        self.rule.clone()
    }

    pub fn triggered_value(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_value.clone()
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_msg.is_empty() {
            true => write!(f, "BlockError: {}", self.block_type),
            false => write!(
                f,
                "BlockError: {}, message: {}",
                self.block_type, self.block_msg
            ),
        }
    }
}

impl std::error::Error for BlockError {}
