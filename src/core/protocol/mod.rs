// src/core/protocol/mod.rs

//! The AMQP 0-9-1 method vocabulary this crate speaks, and the collaborator
//! traits that carry it over the wire.

pub mod codec;
pub mod methods;
pub mod transport;

pub use codec::{ProtocolCodec, Subscription};
pub use methods::{
    CONNECTION_FORCED, CONTROL_CHANNEL, ChannelNumber, CloseReason, ConnectionOpen,
    ConnectionStart, ConnectionStartOk, DEFAULT_LOCALE, FieldTable, FieldValue, MethodKind,
    PLAIN_MECHANISM, REPLY_SUCCESS, ServerMethod, TuneParams,
};
pub use transport::Transport;
