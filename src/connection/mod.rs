// src/connection/mod.rs

//! Manages the lifecycle of a single AMQP connection: the handshake, channel
//! allocation, and teardown from either side.

// Declare the private sub-modules of the `connection` module.
mod channel;
mod handshake;
mod listener;
mod session;
mod state;

// Publicly re-export the primary types from the sub-modules.
pub use channel::ChannelHandle;
pub use state::ConnectionState;

use crate::config::ConnectionOptions;
use crate::core::SessionError;
use crate::core::channel::ChannelReservation;
use crate::core::observer::{SessionObserver, TracingObserver};
use crate::core::protocol::{
    CONTROL_CHANNEL, ChannelNumber, CloseReason, MethodKind, ProtocolCodec, Transport, TuneParams,
};
use handshake::Handshake;
use session::{ChannelLink, Session};
use state::{StateCell, left_open};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opens a connection with the default `tracing` observer.
///
/// Suspends until the handshake completes. On failure no connection exists
/// and the transport has been closed.
pub async fn open_connection(
    transport: Arc<dyn Transport>,
    codec: Arc<dyn ProtocolCodec>,
    options: ConnectionOptions,
) -> Result<Connection, SessionError> {
    Connection::builder(options).open(transport, codec).await
}

/// Configures and opens a `Connection`.
pub struct ConnectionBuilder {
    options: ConnectionOptions,
    observer: Arc<dyn SessionObserver>,
}

impl ConnectionBuilder {
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Routes lifecycle diagnostics to `observer` instead of `tracing`.
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs the handshake over `transport` and returns the open connection.
    pub async fn open(
        self,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn ProtocolCodec>,
    ) -> Result<Connection, SessionError> {
        self.options
            .validate()
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;

        let state = StateCell::new();
        state.advance(ConnectionState::Handshaking)?;
        let close_subscription = codec.subscribe(CONTROL_CHANNEL, MethodKind::ConnectionClose);

        let handshake = Handshake::new(transport.as_ref(), codec.as_ref(), &self.options);
        let outcome = match self.options.handshake_deadline() {
            Some(deadline) => tokio::time::timeout(deadline, handshake.run())
                .await
                .unwrap_or(Err(SessionError::HandshakeTimeout(deadline))),
            None => handshake.run().await,
        };

        let limits = match outcome {
            Ok(limits) => limits,
            Err(e) => {
                self.observer.handshake_failed(&e);
                if let Err(close_err) = transport.close().await {
                    debug!("Transport close after failed handshake also failed: {close_err}");
                }
                return Err(e);
            }
        };

        state.advance(ConnectionState::Open)?;
        let session = Arc::new(Session::new(
            codec,
            transport,
            self.observer,
            limits,
            state,
        ));
        session.observer.connection_opened(&limits);
        listener::spawn_connection_listener(session.clone(), close_subscription);

        Ok(Connection { session })
    }
}

/// An open, negotiated AMQP connection.
///
/// Dropping a `Connection` does not close it; call `close` so the server is
/// told and the transport is shut down.
pub struct Connection {
    session: Arc<Session>,
}

impl Connection {
    pub fn builder(options: ConnectionOptions) -> ConnectionBuilder {
        ConnectionBuilder::new(options)
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// The limits negotiated during tuning.
    pub fn limits(&self) -> TuneParams {
        self.session.limits
    }

    /// Numbers of the channels currently reserved, in ascending order.
    pub fn open_channels(&self) -> Vec<ChannelNumber> {
        self.session.registry.lock().iter().collect()
    }

    /// Waits until the connection reaches `Closed`, from either side.
    pub async fn closed(&self) {
        let mut state_rx = self.session.watch_state();
        if state_rx.wait_for(|s| s.is_terminal()).await.is_err() {
            debug!("Connection state channel dropped while waiting for close.");
        }
    }

    /// Sends connection-close and closes the transport.
    ///
    /// Without a reason the close is reported as forced (320). The server's
    /// close-ok is not awaited. Calling this on a connection that is already
    /// closing or closed is a no-op.
    pub async fn close(&self, reason: Option<CloseReason>) -> Result<(), SessionError> {
        self.session.close(reason.unwrap_or_default()).await
    }

    /// Allocates the lowest free channel number and opens a channel on it.
    pub async fn open_channel(&self) -> Result<ChannelHandle, SessionError> {
        self.session.ensure_open()?;
        let reservation = ChannelReservation::acquire(&self.session.registry)?;
        let number = reservation.number();
        debug!("Reserved channel {number}. Opening.");

        let subscription = self.session.codec.subscribe(number, MethodKind::ChannelClose);
        let mut state_rx = self.session.watch_state();
        let opened = tokio::select! {
            biased;
            _ = left_open(&mut state_rx) => {
                debug!("Connection closed while channel {number} was opening.");
                return Err(SessionError::ConnectionClosed);
            }
            r = self.session.codec.open_channel(number) => r,
        };
        if let Err(e) = opened {
            warn!("Channel {number} failed to open: {e}");
            return Err(SessionError::ChannelOpenFailed {
                channel: number,
                reason: e.to_string(),
            });
        }
        // The connection may have gone away while the channel was opening.
        self.session.ensure_open()?;

        let link = Arc::new(ChannelLink::new());
        listener::spawn_channel_listener(
            self.session.clone(),
            number,
            link.clone(),
            subscription,
            state_rx,
        );
        let number = reservation.commit();
        info!("Channel {number} open.");
        Ok(ChannelHandle::new(number, link, self.session.clone()))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("limits", &self.session.limits)
            .field("open_channels", &self.session.registry.lock().len())
            .finish()
    }
}
