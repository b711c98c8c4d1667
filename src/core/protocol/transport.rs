// src/core/protocol/transport.rs

use crate::core::SessionError;
use async_trait::async_trait;

/// The byte stream underneath the codec. Plain TCP and TLS both sit behind
/// this trait.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Prepares the stream for framed I/O (protocol header exchange included).
    async fn start(&self) -> Result<(), SessionError>;

    async fn close(&self) -> Result<(), SessionError>;

    /// Begins heartbeat emission and monitoring. `0` disables heartbeats.
    fn tune_heartbeat(&self, interval_secs: u16);
}
