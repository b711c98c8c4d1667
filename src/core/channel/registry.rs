// src/core/channel/registry.rs

//! Tracks which channel numbers are live on a connection and hands out the
//! lowest free one.

use crate::core::SessionError;
use crate::core::protocol::{CONTROL_CHANNEL, ChannelNumber};

/// The highest channel number AMQP 0-9-1 can encode. A `channel_max` of 0 in
/// connection-tune means "no limit", which makes every number up to this one
/// allocatable.
pub const PROTOCOL_CHANNEL_MAX: u16 = u16::MAX;

const WORD_BITS: usize = u64::BITS as usize;

/// A bitset of reserved channel numbers in `[1, bound)`.
///
/// Allocation scans whole words with `trailing_ones`, so the lowest free
/// number is found in `bound / 64` steps without walking individual entries.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    /// The `channel_max` negotiated during tuning, as the server sent it.
    channel_max: u16,
    /// Exclusive upper bound of allocatable numbers.
    bound: usize,
    words: Vec<u64>,
    live: usize,
}

impl ChannelRegistry {
    /// Creates an empty registry for the negotiated `channel_max`.
    pub fn new(channel_max: u16) -> Self {
        let bound = if channel_max == 0 {
            PROTOCOL_CHANNEL_MAX as usize + 1
        } else {
            channel_max as usize
        };
        Self {
            channel_max,
            bound,
            words: vec![0; bound.div_ceil(WORD_BITS)],
            live: 0,
        }
    }

    /// Reserves and returns the lowest free channel number.
    ///
    /// Fails with `ChannelsExhausted` and leaves the registry untouched when
    /// every number in `[1, channel_max)` is taken, or every number up to
    /// `PROTOCOL_CHANNEL_MAX` when `channel_max` is 0.
    pub fn allocate(&mut self) -> Result<ChannelNumber, SessionError> {
        for (idx, word) in self.words.iter_mut().enumerate() {
            // The control channel always counts as taken.
            let taken = if idx == 0 {
                *word | (1 << CONTROL_CHANNEL)
            } else {
                *word
            };
            if taken == u64::MAX {
                continue;
            }
            let bit = taken.trailing_ones() as usize;
            let number = idx * WORD_BITS + bit;
            if number >= self.bound {
                break;
            }
            *word |= 1 << bit;
            self.live += 1;
            return Ok(number as ChannelNumber);
        }
        Err(SessionError::ChannelsExhausted {
            channel_max: self.channel_max,
        })
    }

    /// Removes the entry for exactly `number`.
    ///
    /// Returns false if the number was not registered, which is not an error:
    /// duplicate close notifications end up here.
    pub fn release(&mut self, number: ChannelNumber) -> bool {
        if !self.contains(number) {
            return false;
        }
        let (idx, mask) = Self::locate(number);
        self.words[idx] &= !mask;
        self.live -= 1;
        true
    }

    pub fn contains(&self, number: ChannelNumber) -> bool {
        if number == CONTROL_CHANNEL || number as usize >= self.bound {
            return false;
        }
        let (idx, mask) = Self::locate(number);
        self.words[idx] & mask != 0
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The `channel_max` this registry was created with.
    pub fn channel_max(&self) -> u16 {
        self.channel_max
    }

    /// How many channels can be live at once.
    pub fn capacity(&self) -> usize {
        self.bound - 1
    }

    /// Live channel numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ChannelNumber> + '_ {
        self.words.iter().enumerate().flat_map(|(idx, &word)| {
            (0..WORD_BITS)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| (idx * WORD_BITS + bit) as ChannelNumber)
        })
    }

    /// Drops every reservation. Used when the connection goes away.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.live = 0;
    }

    fn locate(number: ChannelNumber) -> (usize, u64) {
        let n = number as usize;
        (n / WORD_BITS, 1 << (n % WORD_BITS))
    }
}
