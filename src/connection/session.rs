// src/connection/session.rs

//! Defines the state shared between a connection, its channel handles and
//! its background listeners.

use super::state::{ConnectionState, StateCell};
use crate::core::SessionError;
use crate::core::channel::{ChannelRegistry, SharedRegistry};
use crate::core::observer::SessionObserver;
use crate::core::protocol::{
    CONTROL_CHANNEL, ChannelNumber, CloseReason, ProtocolCodec, Transport, TuneParams,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, watch};
use tracing::{debug, info, warn};

/// Holds everything one negotiated session needs after the handshake.
pub(crate) struct Session {
    pub(crate) codec: Arc<dyn ProtocolCodec>,
    transport: Arc<dyn Transport>,
    pub(crate) observer: Arc<dyn SessionObserver>,
    /// Negotiated during tuning; never changes afterwards.
    pub(crate) limits: TuneParams,
    pub(crate) registry: SharedRegistry,
    state: StateCell,
    /// Latches the first transport close so later paths skip it.
    transport_closed: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        codec: Arc<dyn ProtocolCodec>,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SessionObserver>,
        limits: TuneParams,
        state: StateCell,
    ) -> Self {
        Self {
            codec,
            transport,
            observer,
            limits,
            registry: Arc::new(Mutex::new(ChannelRegistry::new(limits.channel_max))),
            state,
            transport_closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Fails with `ConnectionClosed` unless the connection is open.
    pub(crate) fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state().is_open() {
            Ok(())
        } else {
            Err(SessionError::ConnectionClosed)
        }
    }

    pub(crate) fn release_channel(&self, channel: ChannelNumber) -> bool {
        self.registry.lock().release(channel)
    }

    /// Caller-initiated close. Sends connection-close and closes the transport
    /// without waiting for close-ok. A no-op once closing has begun.
    pub(crate) async fn close(&self, reason: CloseReason) -> Result<(), SessionError> {
        if !self.state.try_advance_from(ConnectionState::Open) {
            debug!(
                "Close requested while connection is {}; nothing to do.",
                self.state()
            );
            return Ok(());
        }
        info!(
            "Closing connection (reply_code={}, reply_text='{}').",
            reason.reply_code, reason.reply_text
        );

        let sent = self
            .codec
            .send_connection_close(CONTROL_CHANNEL, reason)
            .await;
        if let Err(e) = &sent {
            warn!("Failed to send connection.close: {e}. Closing transport anyway.");
        }
        let closed = self.close_transport_once().await;
        self.finish_close();
        sent.and(closed)
    }

    /// Reacts to connection-close pushed by the server.
    pub(crate) async fn handle_broker_close(&self, reason: CloseReason) {
        if !self.state.try_advance_from(ConnectionState::Open) {
            debug!("Server close arrived after local close began; ignoring.");
            return;
        }
        if let Err(e) = self.codec.send_connection_close_ok(CONTROL_CHANNEL).await {
            warn!("Failed to acknowledge server close: {e}");
        }
        self.observer.connection_closed_by_broker(&reason);
        if let Err(e) = self.close_transport_once().await {
            warn!("Failed to close transport after server close: {e}");
        }
        self.finish_close();
    }

    /// Reacts to channel-close pushed by the server for `channel`.
    pub(crate) async fn handle_broker_channel_close(
        &self,
        channel: ChannelNumber,
        link: &ChannelLink,
        reason: CloseReason,
    ) {
        if !link.mark_closed(Some(reason.clone())) {
            debug!("Channel {channel} already closed locally; ignoring server close.");
            return;
        }
        // The number stays reserved until the server has its close-ok.
        if let Err(e) = self.codec.send_channel_close_ok(channel).await {
            warn!("Failed to acknowledge server close of channel {channel}: {e}");
        }
        self.release_channel(channel);
        self.observer.channel_closed_by_broker(channel, &reason);
    }

    async fn close_transport_once(&self) -> Result<(), SessionError> {
        if self.transport_closed.swap(true, Ordering::AcqRel) {
            debug!("Transport already closed.");
            return Ok(());
        }
        self.transport.close().await
    }

    fn finish_close(&self) {
        self.registry.lock().clear();
        if let Err(e) = self.state.advance(ConnectionState::Closed) {
            warn!("Unexpected state while finishing close: {e}");
        }
        info!("Connection closed.");
    }
}

/// Per-channel state shared by a `ChannelHandle` and its close listener.
#[derive(Debug, Default)]
pub(crate) struct ChannelLink {
    closed: AtomicBool,
    /// Set when the server closed the channel.
    reason: Mutex<Option<CloseReason>>,
    /// Wakes the listener when the caller closes the channel.
    stop: Notify,
}

impl ChannelLink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks the channel closed. Returns false if it already was.
    pub(crate) fn mark_closed(&self, reason: Option<CloseReason>) -> bool {
        let mut slot = self.reason.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if reason.is_some() {
            *slot = reason;
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close_reason(&self) -> Option<CloseReason> {
        self.reason.lock().clone()
    }

    pub(crate) fn stop_listener(&self) {
        self.stop.notify_one();
    }

    pub(crate) async fn stopped(&self) {
        self.stop.notified().await;
    }
}
