//! Restart pacing and reconciliation retry primitives.
//!
//! This library holds the timing rules of the scheduler, free of any node
//! storage or transport concerns:
//!
//! - **Failover**: per-node restart backoff and retry ceiling.
//! - **Reconcile session**: the scheduler-wide attempt counter used while
//!   resynchronizing task state with the cluster manager.
//!
//! # Invariants
//!
//! - Both are polled with an explicit `now`; nothing here reads the clock
//! - Backoff delay is a pure function of the failure count
//! - Backoff delay never decreases as failures grow

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

mod failover;
mod session;

pub use failover::{BackoffCurve, Failover};
pub use session::{ReconcileSession, ReconcileStep};

/// Errors from invalid timing configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A capped curve whose starting delay is above its cap.
    #[error("initial delay {initial:?} exceeds max delay {max:?}")]
    InitialAboveMax { initial: Duration, max: Duration },

    /// A reconcile session that would never try.
    #[error("max tries must be at least 1")]
    ZeroMaxTries,
}

/// Default initial restart delay.
pub const DEFAULT_FAILOVER_DELAY: Duration = Duration::from_secs(60);

/// Default restart delay cap.
pub const DEFAULT_FAILOVER_MAX_DELAY: Duration = Duration::from_secs(10 * 60);

/// Default pause between reconcile attempts.
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(30);

/// Default number of reconcile attempts before giving up.
pub const DEFAULT_RECONCILE_MAX_TRIES: u32 = 3;

/// `at + delay`, saturating at the far future.
pub(crate) fn add_delay(at: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Durations stored as whole seconds.
pub(crate) mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
