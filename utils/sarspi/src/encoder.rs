use std::fmt;

use serde::{Deserialize, Serialize};

use crate::counter::Timing;
use crate::error::Error;

/// Width of the channel address sent to the converter.
pub const CHANNEL_BITS: u32 = 3;

/// Pulse (0-based) carrying the address MSB; the address occupies this pulse
/// and the two that follow.
pub const CHANNEL_FIRST_PULSE: u32 = 1;

/// Input multiplexer address of the remote converter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: usize = 1 << CHANNEL_BITS;

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (0..Self::COUNT as u8).map(Channel)
    }

    /// Address bit `n`, counted from the MSB.
    pub fn bit_msb_first(self, n: u32) -> bool {
        n < CHANNEL_BITS && (self.0 >> (CHANNEL_BITS - 1 - n)) & 1 == 1
    }

    /// Rebuild a channel from bits observed on the wire, MSB first. Extra bits
    /// beyond the address width are ignored.
    pub fn from_bits_msb_first<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let value = bits
            .into_iter()
            .take(CHANNEL_BITS as usize)
            .fold(0u8, |acc, bit| (acc << 1) | bit as u8);
        Channel(value)
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (value as usize) < Self::COUNT {
            Ok(Channel(value))
        } else {
            Err(Error::InvalidChannel(value))
        }
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Pre-delay data-out bit for `counter`: the held address on pulses
/// `CHANNEL_FIRST_PULSE..CHANNEL_FIRST_PULSE + CHANNEL_BITS`, zero elsewhere and
/// while idle.
pub fn encode_bit(timing: &Timing, channel: Channel, counter: u32) -> bool {
    if !timing.is_active(counter) {
        return false;
    }
    match timing.pulse(counter).checked_sub(CHANNEL_FIRST_PULSE) {
        Some(n) => channel.bit_msb_first(n),
        None => false,
    }
}
