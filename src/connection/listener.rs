// src/connection/listener.rs

//! Background tasks that react to methods the server pushes on its own:
//! connection-close on the control channel and channel-close per channel.

use super::session::{ChannelLink, Session};
use super::state::{ConnectionState, left_open};
use crate::core::protocol::{ChannelNumber, ServerMethod, Subscription};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns the listener for server-initiated connection-close.
///
/// The subscription is taken before the handshake starts so a close sent
/// right after connection-open is not missed.
pub(crate) fn spawn_connection_listener(
    session: Arc<Session>,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    let mut state_rx = session.watch_state();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                // The caller closed the connection.
                _ = left_open(&mut state_rx) => {
                    debug!("Connection listener stopping: connection no longer open.");
                    return;
                }
                msg = subscription.recv() => match msg {
                    Ok(ServerMethod::ConnectionClose(reason)) => {
                        session.handle_broker_close(reason).await;
                        return;
                    }
                    Ok(other) => {
                        debug!("Ignoring {} on the control channel.", other.kind());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection listener lagged, {skipped} server methods dropped.");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Control channel subscription ended.");
                        return;
                    }
                }
            }
        }
    })
}

/// Spawns the listener for server-initiated channel-close on `channel`.
///
/// Stops when the caller closes the channel or the connection leaves `Open`.
/// In the latter case the handle is invalidated; the registry is cleared by
/// the connection's own close path.
pub(crate) fn spawn_channel_listener(
    session: Arc<Session>,
    channel: ChannelNumber,
    link: Arc<ChannelLink>,
    mut subscription: Subscription,
    mut state_rx: watch::Receiver<ConnectionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = link.stopped() => {
                    debug!("Channel {channel} listener stopping: closed by caller.");
                    return;
                }
                _ = left_open(&mut state_rx) => {
                    link.mark_closed(None);
                    debug!("Channel {channel} listener stopping: connection no longer open.");
                    return;
                }
                msg = subscription.recv() => match msg {
                    Ok(ServerMethod::ChannelClose(reason)) => {
                        session.handle_broker_channel_close(channel, &link, reason).await;
                        return;
                    }
                    Ok(other) => {
                        debug!("Ignoring {} on channel {channel}.", other.kind());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Channel {channel} listener lagged, {skipped} server methods dropped.");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Channel {channel} subscription ended.");
                        return;
                    }
                }
            }
        }
    })
}
