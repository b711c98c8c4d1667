// src/core/mod.rs

//! The central module containing the protocol vocabulary, channel bookkeeping
//! and error types shared by every connection.

pub mod channel;
pub mod credentials;
pub mod errors;
pub mod observer;
pub mod protocol;

pub use errors::SessionError;
pub use observer::{SessionObserver, TracingObserver};
