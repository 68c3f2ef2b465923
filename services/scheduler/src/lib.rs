//! HDFS scheduler library.
//!
//! This crate primarily ships the `hdfs-scheduler` binary, but the decision
//! core is exposed as a library so it can be driven directly in tests and
//! embedded behind other transports.
//!
//! ## Architecture
//!
//! - **Registry**: the node collection, persisted through a [`store::NodeStore`]
//! - **Placement**: matches resource offers against nodes waiting to start
//! - **Status**: the node lifecycle state machine, driven by task status
//! - **Reconciler**: resynchronizes task state after every subscribe
//! - **Core**: [`scheduler::SchedulerCore`] serializes all of the above per event

pub mod config;
pub mod constraint;
pub mod driver;
pub mod node;
pub mod placement;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transport;

pub use scheduler::{AdminError, SchedulerCore, SchedulerError, SchedulerSettings};
