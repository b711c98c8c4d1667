// src/core/protocol/codec.rs

//! The typed method interface consumed from the frame codec.
//!
//! Encoding methods into frames and reading them back off the transport is the
//! codec's job. The connection manager only sees one async call per method and
//! a subscription for methods the server pushes on its own.

use super::methods::{
    ChannelNumber, CloseReason, ConnectionOpen, ConnectionStart, ConnectionStartOk, MethodKind,
    ServerMethod, TuneParams,
};
use crate::core::SessionError;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A stream of server-initiated methods for one `(channel, kind)` pair.
/// Dropping the receiver unsubscribes.
pub type Subscription = broadcast::Receiver<ServerMethod>;

#[async_trait]
pub trait ProtocolCodec: Send + Sync + 'static {
    async fn receive_connection_start(
        &self,
        channel: ChannelNumber,
    ) -> Result<ConnectionStart, SessionError>;

    async fn send_connection_start_ok(
        &self,
        channel: ChannelNumber,
        args: ConnectionStartOk,
    ) -> Result<(), SessionError>;

    async fn receive_connection_tune(
        &self,
        channel: ChannelNumber,
    ) -> Result<TuneParams, SessionError>;

    async fn send_connection_tune_ok(
        &self,
        channel: ChannelNumber,
        args: TuneParams,
    ) -> Result<(), SessionError>;

    async fn send_connection_open(
        &self,
        channel: ChannelNumber,
        args: ConnectionOpen,
    ) -> Result<(), SessionError>;

    async fn send_connection_close(
        &self,
        channel: ChannelNumber,
        args: CloseReason,
    ) -> Result<(), SessionError>;

    async fn send_connection_close_ok(&self, channel: ChannelNumber) -> Result<(), SessionError>;

    /// Runs the channel-level open exchange (channel-open / channel-open-ok).
    async fn open_channel(&self, channel: ChannelNumber) -> Result<(), SessionError>;

    /// Runs the caller-initiated channel close exchange.
    async fn close_channel(
        &self,
        channel: ChannelNumber,
        args: CloseReason,
    ) -> Result<(), SessionError>;

    async fn send_channel_close_ok(&self, channel: ChannelNumber) -> Result<(), SessionError>;

    /// Subscribes to server-initiated methods of `kind` arriving on `channel`.
    fn subscribe(&self, channel: ChannelNumber, kind: MethodKind) -> Subscription;
}
