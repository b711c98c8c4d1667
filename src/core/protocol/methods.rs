// src/core/protocol/methods.rs

//! Typed arguments for the connection-class methods exchanged during the
//! handshake and teardown, plus the server-initiated methods delivered through
//! subscriptions.

use bytes::Bytes;
use std::collections::BTreeMap;
use strum_macros::Display;

/// A channel number as carried in every AMQP frame header.
pub type ChannelNumber = u16;

/// Channel 0 carries connection-level methods and is never handed to callers.
pub const CONTROL_CHANNEL: ChannelNumber = 0;

/// Reply code for a clean, application-requested close.
pub const REPLY_SUCCESS: u16 = 200;

/// Reply code for an administrative or forced connection close.
pub const CONNECTION_FORCED: u16 = 320;

/// The only SASL mechanism this client authenticates with.
pub const PLAIN_MECHANISM: &str = "PLAIN";

/// The message locale requested when none is configured.
pub const DEFAULT_LOCALE: &str = "en_US";

/// A value stored in an AMQP field table.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    LongInt(i32),
    LongString(String),
    Table(FieldTable),
}

/// An AMQP field table. Ordered so that encodings are deterministic.
pub type FieldTable = BTreeMap<String, FieldValue>;

/// The server's connection-start announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStart {
    pub version_major: u8,
    pub version_minor: u8,
    pub server_properties: FieldTable,
    /// Space-separated list of SASL mechanisms the server accepts.
    pub mechanisms: String,
    /// Space-separated list of message locales the server supports.
    pub locales: String,
}

impl ConnectionStart {
    /// Returns true if `mechanism` appears in the server's mechanism list.
    pub fn offers_mechanism(&self, mechanism: &str) -> bool {
        self.mechanisms.split_whitespace().any(|m| m == mechanism)
    }

    /// Returns true if `locale` appears in the server's locale list.
    pub fn offers_locale(&self, locale: &str) -> bool {
        self.locales.split_whitespace().any(|l| l == locale)
    }
}

/// The client's connection-start-ok reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStartOk {
    pub client_properties: FieldTable,
    pub mechanism: String,
    /// The opaque SASL response. For `PLAIN` this is `\0username\0password`.
    pub response: Bytes,
    pub locale: String,
}

/// Session limits, as proposed by connection-tune and echoed by connection-tune-ok.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneParams {
    /// Highest channel number bound. `0` means the server imposes no limit.
    pub channel_max: u16,
    /// Largest frame size in bytes. `0` means no limit.
    pub frame_max: u32,
    /// Heartbeat interval in seconds. `0` disables heartbeats.
    pub heartbeat: u16,
}

/// The client's connection-open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOpen {
    pub virtual_host: String,
}

/// Arguments of connection-close and channel-close, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub reply_code: u16,
    pub reply_text: String,
    /// Class of the method that caused the close, or 0.
    pub class_id: u16,
    /// Method that caused the close, or 0.
    pub method_id: u16,
}

impl CloseReason {
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
        }
    }

    /// A clean, application-level close.
    pub fn normal() -> Self {
        Self::new(REPLY_SUCCESS, "Goodbye")
    }

    /// Sets the class and method that triggered the close.
    pub fn caused_by(mut self, class_id: u16, method_id: u16) -> Self {
        self.class_id = class_id;
        self.method_id = method_id;
        self
    }
}

impl Default for CloseReason {
    /// The reason sent when the caller does not supply one: a forced close.
    fn default() -> Self {
        Self::new(CONNECTION_FORCED, "")
    }
}

/// The kinds of server-initiated methods a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum MethodKind {
    ConnectionClose,
    ChannelClose,
}

/// A method pushed by the server outside of any request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMethod {
    ConnectionClose(CloseReason),
    ChannelClose(CloseReason),
}

impl ServerMethod {
    pub fn kind(&self) -> MethodKind {
        match self {
            ServerMethod::ConnectionClose(_) => MethodKind::ConnectionClose,
            ServerMethod::ChannelClose(_) => MethodKind::ChannelClose,
        }
    }

    pub fn reason(&self) -> &CloseReason {
        match self {
            ServerMethod::ConnectionClose(r) | ServerMethod::ChannelClose(r) => r,
        }
    }
}
