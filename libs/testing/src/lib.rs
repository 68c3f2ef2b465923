//! Test support for the HDFS scheduler.
//!
//! - [`RecordingDriver`] captures every outbound command
//! - [`OfferBuilder`] builds offers with sensible defaults
//! - [`at`] gives deterministic timestamps

mod builders;
mod driver;

use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

pub use builders::{offer, OfferBuilder};
pub use driver::RecordingDriver;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Output is captured per test and only shown for failures unless the
/// tests run with `--nocapture`. Enable levels with `RUST_LOG=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// A fixed timestamp `secs` seconds after a test epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}
