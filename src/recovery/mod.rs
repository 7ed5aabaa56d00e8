pub mod ack_book;

pub use ack_book::{AckBook, AckEntryKind};

/// Fixed retransmission timeout (`spec.md` §4.9: "fixed-RTO loss
/// detection", a deliberate simplification of real congestion-aware loss
/// detection, which is an explicit Non-goal).
pub const DEFAULT_RTO_MILLIS: u64 = 1000;
