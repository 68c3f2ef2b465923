//! # hdfs-id
//!
//! Typed identifiers used by the HDFS cluster scheduler.
//!
//! ## Kinds of IDs
//!
//! - **Generated IDs** are minted by the scheduler itself and use a prefixed
//!   ULID format: `{prefix}_{ulid}` (for example `task_01HV4Z2WQXKJNM8GPQY6VBKC3D`).
//! - **Assigned names** are chosen by an operator (`NodeId`, e.g. `nn`, `dn0`).
//! - **External IDs** are opaque strings handed to us by the cluster manager
//!   (`OfferId`, `FrameworkId`). We never parse their contents.
//!
//! All IDs have a `short()` form that is used in log lines.

mod error;
mod macros;
mod types;

pub use error::IdError;
#[doc(hidden)]
pub use macros::short_suffix;
pub use macros::SHORT_LEN;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
