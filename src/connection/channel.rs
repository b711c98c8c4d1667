// src/connection/channel.rs

//! Defines `ChannelHandle`, the caller's view of one open channel.

use super::session::{ChannelLink, Session};
use super::state::left_open;
use crate::core::SessionError;
use crate::core::protocol::{ChannelNumber, CloseReason};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// An open channel on a connection.
///
/// The handle owns the channel's number until it is closed, either by
/// `close` or by the server. After that, or after the connection closes,
/// `is_open` is false and `close` does nothing.
pub struct ChannelHandle {
    number: ChannelNumber,
    link: Arc<ChannelLink>,
    session: Arc<Session>,
}

impl ChannelHandle {
    pub(crate) fn new(number: ChannelNumber, link: Arc<ChannelLink>, session: Arc<Session>) -> Self {
        Self {
            number,
            link,
            session,
        }
    }

    pub fn number(&self) -> ChannelNumber {
        self.number
    }

    pub fn is_open(&self) -> bool {
        !self.link.is_closed() && self.session.state().is_open()
    }

    /// The reason the server gave when it closed this channel, if it did.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.link.close_reason()
    }

    /// Closes the channel and returns its number to the connection.
    ///
    /// Without a reason a clean close (200) is sent. Closing an already
    /// closed channel is a no-op. The number is released even if the close
    /// exchange fails. If the connection closes mid-exchange this returns
    /// `ConnectionClosed`.
    pub async fn close(&self, reason: Option<CloseReason>) -> Result<(), SessionError> {
        if !self.link.mark_closed(None) {
            debug!("Channel {} already closed.", self.number);
            return Ok(());
        }
        self.link.stop_listener();

        let mut state_rx = self.session.watch_state();
        let connection_open = state_rx.borrow().is_open();
        let result = if connection_open {
            let exchange = self
                .session
                .codec
                .close_channel(self.number, reason.unwrap_or_else(CloseReason::normal));
            tokio::select! {
                biased;
                _ = left_open(&mut state_rx) => {
                    debug!("Connection closed while channel {} was closing.", self.number);
                    Err(SessionError::ConnectionClosed)
                }
                r = exchange => r,
            }
        } else {
            Ok(())
        };
        if let Err(e) = &result {
            warn!("Channel {} close exchange failed: {e}", self.number);
        }

        self.session.release_channel(self.number);
        debug!("Channel {} closed and released.", self.number);
        result
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("number", &self.number)
            .field("open", &self.is_open())
            .finish()
    }
}
