// src/core/observer.rs

//! Diagnostics hooks for notable session events.
//!
//! The connection manager never prints. It reports to a `SessionObserver`
//! and the caller decides where the report goes.

use crate::core::SessionError;
use crate::core::protocol::{ChannelNumber, CloseReason, TuneParams};
use tracing::{error, info, warn};

/// Receives lifecycle events from a connection and its channels.
///
/// Every method has an empty default so implementors only pick what they need.
/// Calls are made from listener tasks and must not block.
pub trait SessionObserver: Send + Sync + 'static {
    fn connection_opened(&self, _limits: &TuneParams) {}

    fn handshake_failed(&self, _error: &SessionError) {}

    fn connection_closed_by_broker(&self, _reason: &CloseReason) {}

    fn channel_closed_by_broker(&self, _channel: ChannelNumber, _reason: &CloseReason) {}
}

/// The default observer, which forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn connection_opened(&self, limits: &TuneParams) {
        info!(
            "Connection open. channel_max={}, frame_max={}, heartbeat={}s",
            limits.channel_max, limits.frame_max, limits.heartbeat
        );
    }

    fn handshake_failed(&self, err: &SessionError) {
        error!("Connection handshake failed: {err}");
    }

    fn connection_closed_by_broker(&self, reason: &CloseReason) {
        warn!(
            reply_code = reason.reply_code,
            class_id = reason.class_id,
            method_id = reason.method_id,
            "Connection closed by server: {}",
            reason.reply_text
        );
    }

    fn channel_closed_by_broker(&self, channel: ChannelNumber, reason: &CloseReason) {
        info!(
            reply_code = reason.reply_code,
            "Channel {channel} closed by server: {}", reason.reply_text
        );
    }
}
