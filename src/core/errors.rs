// src/core/errors.rs

//! Defines the primary error type for the connection and channel lifecycle.

use crate::core::protocol::ChannelNumber;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The main error enum, representing every failure a caller of the session API can see.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Handshake failed during {step}: {reason}")]
    HandshakeFailure { step: &'static str, reason: String },

    #[error("Handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Maximum channels {channel_max} reached")]
    ChannelsExhausted { channel_max: u16 },

    #[error("Channel {channel} failed to open: {reason}")]
    ChannelOpenFailed {
        channel: ChannelNumber,
        reason: String,
    },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Invalid connection options: {0}")]
    InvalidConfig(String),

    #[error("Operation not allowed in the current state: {0}")]
    InvalidState(String),

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Transport Error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Wraps a collaborator failure as a handshake failure at the named step.
    /// Timeouts and failures that are already handshake failures pass through.
    pub(crate) fn at_step(self, step: &'static str) -> Self {
        match self {
            e @ (SessionError::HandshakeFailure { .. } | SessionError::HandshakeTimeout(_)) => e,
            other => SessionError::HandshakeFailure {
                step,
                reason: other.to_string(),
            },
        }
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for SessionError {
    fn clone(&self) -> Self {
        match self {
            SessionError::Io(e) => SessionError::Io(Arc::clone(e)),
            SessionError::HandshakeFailure { step, reason } => SessionError::HandshakeFailure {
                step: *step,
                reason: reason.clone(),
            },
            SessionError::HandshakeTimeout(d) => SessionError::HandshakeTimeout(*d),
            SessionError::ChannelsExhausted { channel_max } => SessionError::ChannelsExhausted {
                channel_max: *channel_max,
            },
            SessionError::ChannelOpenFailed { channel, reason } => {
                SessionError::ChannelOpenFailed {
                    channel: *channel,
                    reason: reason.clone(),
                }
            }
            SessionError::ConnectionClosed => SessionError::ConnectionClosed,
            SessionError::InvalidConfig(s) => SessionError::InvalidConfig(s.clone()),
            SessionError::InvalidState(s) => SessionError::InvalidState(s.clone()),
            SessionError::Protocol(s) => SessionError::Protocol(s.clone()),
            SessionError::Transport(s) => SessionError::Transport(s.clone()),
        }
    }
}

impl PartialEq for SessionError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SessionError::Io(e1), SessionError::Io(e2)) => e1.to_string() == e2.to_string(),
            (
                SessionError::HandshakeFailure {
                    step: s1,
                    reason: r1,
                },
                SessionError::HandshakeFailure {
                    step: s2,
                    reason: r2,
                },
            ) => s1 == s2 && r1 == r2,
            (SessionError::HandshakeTimeout(d1), SessionError::HandshakeTimeout(d2)) => d1 == d2,
            (
                SessionError::ChannelsExhausted { channel_max: m1 },
                SessionError::ChannelsExhausted { channel_max: m2 },
            ) => m1 == m2,
            (
                SessionError::ChannelOpenFailed {
                    channel: c1,
                    reason: r1,
                },
                SessionError::ChannelOpenFailed {
                    channel: c2,
                    reason: r2,
                },
            ) => c1 == c2 && r1 == r2,
            (SessionError::InvalidConfig(s1), SessionError::InvalidConfig(s2)) => s1 == s2,
            (SessionError::InvalidState(s1), SessionError::InvalidState(s2)) => s1 == s2,
            (SessionError::Protocol(s1), SessionError::Protocol(s2)) => s1 == s2,
            (SessionError::Transport(s1), SessionError::Transport(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(Arc::new(e))
    }
}
