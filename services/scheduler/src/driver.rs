//! Channel-backed command sink.

use hdfs_events::{Command, Driver};
use tokio::sync::mpsc;
use tracing::warn;

/// Hands commands to an async writer through an unbounded channel, so the
/// core never waits on I/O.
#[derive(Debug, Clone)]
pub struct ChannelDriver {
    tx: mpsc::UnboundedSender<Command>,
}

impl ChannelDriver {
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    /// A driver and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Driver for ChannelDriver {
    fn send(&mut self, command: Command) {
        if let Err(e) = self.tx.send(command) {
            warn!(command = %e.0, "Command channel closed, dropping command");
        }
    }
}
