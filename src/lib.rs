// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::config::ConnectionOptions;
pub use crate::connection::{
    ChannelHandle, Connection, ConnectionBuilder, ConnectionState, open_connection,
};
pub use crate::core::SessionError;
