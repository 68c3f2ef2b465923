//! Configuration for the scheduler binary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use hdfs_events::Version;
use hdfs_reconcile::{DEFAULT_RECONCILE_DELAY, DEFAULT_RECONCILE_MAX_TRIES};

use crate::scheduler::SchedulerSettings;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the node registry is persisted.
    pub state_file: PathBuf,

    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Oldest cluster manager version accepted on subscribe.
    pub min_master_version: Version,

    /// Pause between reconcile attempts.
    pub reconcile_delay: Duration,

    /// Reconcile attempts before unresolved tasks are presumed dead.
    pub reconcile_max_tries: u32,

    /// Framework name; also the prefix of launched task names.
    pub framework_name: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let state_file = lookup("HDFS_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("hdfs-scheduler.json"));

        let log_level = lookup("HDFS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let min_master_version = match lookup("HDFS_MIN_MASTER_VERSION") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid HDFS_MIN_MASTER_VERSION {v:?}"))?,
            None => Version::new([0, 23, 0]),
        };

        let reconcile_delay = lookup("HDFS_RECONCILE_DELAY_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECONCILE_DELAY);

        let reconcile_max_tries = lookup("HDFS_RECONCILE_MAX_TRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RECONCILE_MAX_TRIES);

        let framework_name = lookup("HDFS_FRAMEWORK_NAME").unwrap_or_else(|| "hdfs".to_string());

        Ok(Self {
            state_file,
            log_level,
            min_master_version,
            reconcile_delay,
            reconcile_max_tries,
            framework_name,
        })
    }

    pub fn settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            min_master_version: self.min_master_version.clone(),
            reconcile_delay: self.reconcile_delay,
            reconcile_max_tries: self.reconcile_max_tries,
            task_name_prefix: self.framework_name.clone(),
        }
    }
}
