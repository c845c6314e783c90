use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which bits of the sample shift register are copied into the latch at the
/// end of a frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LatchWindow {
    /// Bits 10..=3, bit-exact with the reference design. Drops the oldest bit
    /// and the three most recent ones, leaving an 8-bit sample.
    #[default]
    Reference,
    /// The whole shift register.
    Full,
    /// Any contiguous window, inclusive on both ends.
    Bits { msb: u8, lsb: u8 },
}

impl LatchWindow {
    const REFERENCE_MSB: u8 = 10;
    const REFERENCE_LSB: u8 = 3;

    /// `(msb, lsb)` for a shift register of `resolution` bits.
    pub fn bounds(&self, resolution: u8) -> (u8, u8) {
        match *self {
            LatchWindow::Reference => (Self::REFERENCE_MSB, Self::REFERENCE_LSB),
            LatchWindow::Full => (resolution.saturating_sub(1), 0),
            LatchWindow::Bits { msb, lsb } => (msb, lsb),
        }
    }

    pub fn width(&self, resolution: u8) -> u8 {
        let (msb, lsb) = self.bounds(resolution);
        msb.saturating_sub(lsb) + 1
    }

    pub fn check(&self, resolution: u8) -> Result<(), ConfigError> {
        let (msb, lsb) = self.bounds(resolution);
        if lsb > msb || msb >= resolution {
            return Err(ConfigError::LatchWindow {
                msb,
                lsb,
                resolution,
            });
        }
        Ok(())
    }

    pub fn extract(&self, shift: u16, resolution: u8) -> u16 {
        let (_, lsb) = self.bounds(resolution);
        (shift >> lsb) & mask(self.width(resolution))
    }
}

pub(crate) fn mask(bits: u8) -> u16 {
    if bits >= 16 {
        u16::MAX
    } else {
        (1u16 << bits) - 1
    }
}

/// Append one serial input bit, MSB-first accumulation.
pub fn shift_in(shift: u16, bit: bool, resolution: u8) -> u16 {
    ((shift << 1) | bit as u16) & mask(resolution)
}

/// Shared view of the latched sample for consumers outside the tick loop.
///
/// Written once per completed frame; between writes it keeps the previous
/// frame's value.
#[derive(Debug, Clone, Default)]
pub struct SampleHandle {
    value: Arc<AtomicU16>,
    frames: Arc<AtomicU64>,
}

impl SampleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, value: u16) {
        self.value.store(value, Ordering::Release);
        self.frames.fetch_add(1, Ordering::AcqRel);
    }

    /// Most recent latched sample.
    pub fn get(&self) -> u16 {
        self.value.load(Ordering::Acquire)
    }

    /// Number of frames latched so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}
