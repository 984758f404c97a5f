//! Admission verdicts handed back by the rule checking stages.
use super::{BlockError, RampartRule, Snapshot};
use crate::{Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

type OtherBlockType = u8;

/// Why an entry was kept out. `Other` carries an id registered through
/// [`registry_block_type`] so embedders can add their own categories.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BlockType {
    #[default]
    Unknown,
    Flow,
    CircuitBreaking,
    SystemFlow,
    Other(OtherBlockType),
}

lazy_static! {
    static ref CUSTOM_BLOCK_TYPES: Mutex<HashMap<OtherBlockType, &'static str>> =
        Mutex::new(HashMap::new());
}

const BLOCK_TYPE_TAKEN: &str = "block type already registered";

/// Registers a description for a custom block type id. Built-in types and
/// ids that were already claimed are rejected.
pub fn registry_block_type(other: BlockType, desc: &'static str) -> Result<()> {
    let id = match other {
        BlockType::Other(id) => id,
        _ => return Err(Error::msg(BLOCK_TYPE_TAKEN)),
    };
    let mut map = CUSTOM_BLOCK_TYPES.lock().unwrap();
    if map.contains_key(&id) {
        return Err(Error::msg(BLOCK_TYPE_TAKEN));
    }
    map.insert(id, desc);
    Ok(())
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Other(id) => match CUSTOM_BLOCK_TYPES.lock().unwrap().get(id) {
                Some(desc) => write!(f, "{}", desc),
                None => write!(f, "{}", id),
            },
            known => write!(f, "{:?}", known),
        }
    }
}

/// Outcome of running an entry through the rule stages. `Wait` tells the
/// caller to delay for the given nanoseconds before proceeding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TokenResult {
    #[default]
    Pass,
    Blocked(BlockError),
    Wait(u64),
}

impl TokenResult {
    pub fn new_pass() -> Self {
        Self::Pass
    }

    pub fn new_should_wait(nanos_to_wait: u64) -> Self {
        Self::Wait(nanos_to_wait)
    }

    pub fn new_blocked(block_type: BlockType) -> Self {
        Self::Blocked(BlockError::new(block_type))
    }

    pub fn new_blocked_with_msg(block_type: BlockType, block_msg: String) -> Self {
        Self::Blocked(BlockError::new_with_msg(block_type, block_msg))
    }

    pub fn new_blocked_with_cause(
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn RampartRule>,
        snapshot_value: Arc<Snapshot>,
    ) -> Self {
        Self::Blocked(BlockError::new_with_cause(
            block_type,
            block_msg,
            rule,
            snapshot_value,
        ))
    }

    pub fn reset_to_pass(&mut self) {
        *self = Self::new_pass();
    }

    pub fn reset_to_blocked(&mut self, block_type: BlockType) {
        *self = Self::new_blocked(block_type);
    }

    pub fn reset_to_blocked_with_msg(&mut self, block_type: BlockType, block_msg: String) {
        *self = Self::new_blocked_with_msg(block_type, block_msg);
    }

    pub fn reset_to_blocked_with_cause(
        &mut self,
        block_type: BlockType,
        block_msg: String,
        rule: Arc<dyn RampartRule>,
        snapshot_value: Arc<Snapshot>,
    ) {
        *self = Self::new_blocked_with_cause(block_type, block_msg, rule, snapshot_value);
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait(_))
    }

    pub fn block_err(&self) -> Option<BlockError> {
        match self {
            Self::Blocked(err) => Some(err.clone()),
            _ => None,
        }
    }

    pub fn nanos_to_wait(&self) -> u64 {
        match self {
            Self::Wait(nanos) => *nanos,
            _ => 0,
        }
    }
}

impl fmt::Display for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenResult::Pass => write!(f, "TokenResult::Pass"),
            TokenResult::Blocked(block_err) => write!(f, "TokenResult::Blocked: {:?}", block_err),
            TokenResult::Wait(nanos_to_wait) => {
                write!(f, "TokenResult::Wait: {} ns", nanos_to_wait)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn custom_block_type_registers_once() {
        registry_block_type(BlockType::Other(100), "Quota").unwrap();
        assert_eq!(BlockType::Other(100).to_string(), "Quota");
        assert!(registry_block_type(BlockType::Other(100), "Quota").is_err());
    }

    #[test]
    fn builtin_block_types_are_reserved() {
        assert!(registry_block_type(BlockType::Flow, "Flow").is_err());
        assert!(registry_block_type(BlockType::Unknown, "Unknown").is_err());
    }

    #[test]
    fn unregistered_custom_type_shows_its_id() {
        assert_eq!(BlockType::Other(250).to_string(), "250");
    }

    #[test]
    fn verdict_predicates() {
        assert!(TokenResult::new_pass().is_pass());
        assert!(TokenResult::new_blocked(BlockType::Flow).is_blocked());
        let wait = TokenResult::new_should_wait(42);
        assert!(wait.is_wait());
        assert_eq!(wait.nanos_to_wait(), 42);
        assert_eq!(TokenResult::new_pass().nanos_to_wait(), 0);
    }

    #[test]
    fn blocked_verdict_exposes_its_error() {
        let mut res = TokenResult::new_blocked_with_msg(BlockType::Flow, "over the limit".into());
        let err = res.block_err().unwrap();
        assert_eq!(err.block_type(), BlockType::Flow);
        assert_eq!(err.block_msg(), "over the limit");
        res.reset_to_pass();
        assert!(res.block_err().is_none());
    }
}
