// src/core/channel/mod.rs

//! Channel number bookkeeping for a single connection.

mod guard;
mod registry;

pub use guard::ChannelReservation;
pub use registry::{ChannelRegistry, PROTOCOL_CHANNEL_MAX};

use parking_lot::Mutex;
use std::sync::Arc;

/// A registry shared between a connection, its reservations and its listeners.
pub type SharedRegistry = Arc<Mutex<ChannelRegistry>>;
