//! # ticket-seeds
//!
//! TLS session ticket key management for a fleet of servers.
//!
//! Every server is configured with the same three lists of seeds (old,
//! current, new). Base keys are derived from the seeds by hash chaining and
//! each ticket gets its own key, derived from the base key and a random salt
//! carried in the ticket's name field. Any server holding the same seeds can
//! therefore resume any other server's tickets, with no coordination beyond
//! the configuration push itself.
//!
//! Rotation is a sequence of configuration pushes: introduce a seed as NEW,
//! promote it to CURRENT, retire it to OLD. Tickets under OLD or NEW keys
//! still resume but are flagged for renewal under the CURRENT key.
//!
//! ## Public API
//!
//! [`TicketKeyManager`] is the entry point. It implements [`TicketHandler`],
//! the interface a TLS library drives per session ticket. The ticket
//! cipher and MAC themselves stay with the caller through
//! [`TicketContext`]; [`SealingContext`] is a ready-made one.

pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod seeds;
pub mod stats;
pub mod ticket;

pub use config::TicketSeeds;
pub use crypto::SealingContext;
pub use error::TicketKeyError;
pub use manager::TicketKeyManager;
pub use seeds::SeedCategory;
pub use stats::{FileStatsSink, NoopStats, RotationRecord, StatsLog, TicketStats};
pub use ticket::{TicketContext, TicketHandler, TicketName, TicketOutcome};
