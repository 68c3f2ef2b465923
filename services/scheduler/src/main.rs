//! HDFS scheduler
//!
//! Keeps a fixed set of HDFS nodes running on resources offered by the
//! cluster manager. Events are read from stdin and commands written to
//! stdout, one JSON object per line.

use anyhow::Result;
use hdfs_scheduler::config::Config;
use hdfs_scheduler::driver::ChannelDriver;
use hdfs_scheduler::store::JsonFileStore;
use hdfs_scheduler::transport::{run_event_loop, write_commands};
use hdfs_scheduler::SchedulerCore;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting HDFS scheduler");
    info!(
        state_file = %config.state_file.display(),
        min_master_version = %config.min_master_version,
        reconcile_delay_secs = config.reconcile_delay.as_secs(),
        reconcile_max_tries = config.reconcile_max_tries,
        framework_name = %config.framework_name,
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (driver, commands) = ChannelDriver::channel();
    let store = JsonFileStore::new(&config.state_file);
    let mut core = SchedulerCore::new(store, driver, config.settings())?;

    let writer = tokio::spawn(write_commands(commands, tokio::io::stdout()));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    let result = run_event_loop(&mut core, BufReader::new(tokio::io::stdin()), shutdown_rx).await;
    if let Err(e) = &result {
        error!(error = %e, "Event loop error");
    }

    // Dropping the core closes the command channel and lets the writer drain.
    drop(core);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Command writer error"),
        Err(e) => error!(error = %e, "Command writer panicked"),
    }

    info!("HDFS scheduler shutdown complete");
    result
}
