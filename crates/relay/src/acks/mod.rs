//! Acknowledgment tracking.
//!
//! This module handles:
//! - The registry of outstanding emergency notifications
//! - The background poll cycle reconciling it against provider receipt status
//! - Per-alert fan-out of observed acknowledgments
//!
//! ## Submodules
//!
//! - `registry` - Pending-ack records and their invariants
//! - `poll` - Batch poll loop and its lifecycle handle
//! - `events` - Broadcast topics keyed by alert name

pub mod events;
pub mod poll;
pub mod registry;

// Re-export commonly used items
pub use events::AckEvents;
pub use poll::{PollHandle, run_batch};
pub use registry::{AckKey, AckRegistry, PendingAck};
