//! JSON-lines transport shim.
//!
//! Inbound events arrive one JSON object per line; outbound commands leave
//! the same way. This keeps the binary testable without a cluster manager:
//! anything that can speak line-delimited JSON can drive the core.

use anyhow::Result;
use chrono::Utc;
use hdfs_events::{Command, Driver, SchedulerEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::scheduler::SchedulerCore;
use crate::store::NodeStore;

/// Feeds events from `input` into `core` until EOF or shutdown.
///
/// Blank lines are skipped. Lines that don't parse as an event are logged
/// and skipped.
pub async fn run_event_loop<S, D, R>(
    core: &mut SchedulerCore<S, D>,
    input: R,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: NodeStore,
    D: Driver,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_no = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Event stream closed");
                    return Ok(());
                };
                line_no += 1;

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<SchedulerEvent>(line) {
                    Ok(event) => {
                        debug!(line = line_no, "Event received");
                        core.handle(event, Utc::now());
                    }
                    Err(e) => {
                        warn!(line = line_no, error = %e, "Skipping malformed event");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Event loop shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// Writes each command from `rx` to `output` as one JSON line, until every
/// sender is gone.
pub async fn write_commands<W>(mut rx: mpsc::UnboundedReceiver<Command>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
        debug!(command = %command, "Command sent");
    }
    Ok(())
}
