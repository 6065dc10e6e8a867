//! SysV shared-memory MWMR ring queues.
//!
//! Every cross-process record here is a plain-bits, `#[repr(C)]`, `Copy`
//! struct written directly into a `shmget`/`shmat` segment, using the
//! same cache-line-aligned, sequence-counter discipline as a lock-free
//! slot ring, generalized from byte payloads to typed payloads.

pub mod queue;
pub mod records;

pub use queue::{ShmQueue, ShmRecord};
pub use records::{
    ExchangeType, FeedType, MarketUpdate, OrdType, PriceLevel, ResponseMsg, ResponseType,
    RequestMsg, Side, SYMBOL_LEN, EXEC_ID_LEN, DEPTH_LEVELS,
};

/// Well-known SysV keys for the three process-global queues (§6).
pub mod keys {
    pub const REQUEST: i32 = 0x0F20;
    pub const RESPONSE: i32 = 0x1308;
    pub const MARKET_DATA: i32 = 0x1001;
    pub const CLIENT_STORE: i32 = 0x16F0;
}

pub const DEFAULT_REQUEST_CAPACITY: u32 = 4096;
pub const DEFAULT_RESPONSE_CAPACITY: u32 = 4096;
pub const DEFAULT_MD_CAPACITY: u32 = 65536;
