// src/core/channel/guard.rs

//! Defines `ChannelReservation`, an RAII guard over a reserved channel number.

use super::SharedRegistry;
use crate::core::SessionError;
use crate::core::protocol::ChannelNumber;
use tracing::debug;

/// Holds a channel number between allocation and a successful channel open.
///
/// The number is reserved before the channel-open exchange starts so that
/// concurrent opens never collide. If the exchange fails, or the future
/// driving it is dropped, the guard gives the number back.
#[derive(Debug)]
pub struct ChannelReservation {
    registry: SharedRegistry,
    number: ChannelNumber,
    /// Set once the number belongs to an open channel; skips release on drop.
    committed: bool,
}

impl ChannelReservation {
    /// Allocates the lowest free number from `registry`.
    pub fn acquire(registry: &SharedRegistry) -> Result<Self, SessionError> {
        let number = registry.lock().allocate()?;
        Ok(Self {
            registry: registry.clone(),
            number,
            committed: false,
        })
    }

    pub fn number(&self) -> ChannelNumber {
        self.number
    }

    /// Hands the number over to an open channel. From here on the channel's
    /// close path is responsible for releasing it.
    pub fn commit(mut self) -> ChannelNumber {
        self.committed = true;
        self.number
    }
}

impl Drop for ChannelReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.registry.lock().release(self.number) {
            debug!(
                "Released reservation for channel {} after an unfinished open.",
                self.number
            );
        }
    }
}
