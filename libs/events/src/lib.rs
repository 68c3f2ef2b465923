//! # hdfs-events
//!
//! Everything that crosses the boundary between the scheduler core and the
//! cluster manager transport.
//!
//! ## Inbound
//!
//! The transport delivers [`SchedulerEvent`]s one at a time:
//! - `Subscribed` when a session is (re)established
//! - `Offers` with a batch of resource offers
//! - `Status` with a single task status update
//! - `Disconnected` when the session is lost
//!
//! ## Outbound
//!
//! The core issues [`Command`]s through a [`Driver`]. Commands are
//! fire-and-forget: the core never waits for a reply and never sees a send
//! failure. Every command is safe to repeat for an already resolved id.

mod command;
mod error;
mod types;
mod version;

pub use command::*;
pub use error::EventError;
pub use types::*;
pub use version::Version;
