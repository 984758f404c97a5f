//! Crate-wide constants.

/// Initial capacity of each slot bucket in a `SlotChain`.
pub const SLOT_INIT: usize = 8;

/// Upper bound on the number of distinct resources with cached slot chains.
/// Resources beyond this cap are admitted unmonitored.
pub const MAX_SLOT_CHAIN_SIZE: usize = 6000;

/// Upper bound on the number of distinct context names tracked per resource.
/// Beyond this cap statistics degrade to the resource-level node.
pub const MAX_CONTEXT_NAME_SIZE: usize = 2000;

/// Context name used when the caller does not name one.
pub const DEFAULT_CONTEXT_NAME: &str = "rampart_default_context";

/// Virtual resource aggregating all inbound traffic of the process.
pub const TOTAL_IN_RESOURCE_NAME: &str = "__total_inbound_traffic__";

/// `limit_app` value matching traffic with no specific origin rule.
pub const LIMIT_ORIGIN_DEFAULT: &str = "default";
/// `limit_app` value matching origins not named by any other rule.
pub const LIMIT_ORIGIN_OTHER: &str = "other";

/// Default window of the read-only per resource metric view.
pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

/// Default window of the underlying per resource statistic array, which the
/// metric views above must be reusable on.
pub const DEFAULT_SAMPLE_COUNT_TOTAL: u32 = 20;
pub const DEFAULT_INTERVAL_MS_TOTAL: u32 = 10000;

/// `RampartInput.flag` bit marking a prioritized request, which may borrow
/// tokens from the next window instead of being rejected right away.
pub const FLAG_PRIORITIZED: i32 = 0x1;

/// Round trip times above this value are clamped when recorded.
pub const DEFAULT_STATISTIC_MAX_RT: u64 = 60000;
