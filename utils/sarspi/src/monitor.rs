use crate::capture::mask;
use crate::counter::PULSES_PER_FRAME;
use crate::encoder::{CHANNEL_BITS, CHANNEL_FIRST_PULSE, Channel};
use crate::engine::Lines;

/// One complete frame as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Data-out sampled on each falling SCLK edge, first edge in the MSB.
    pub mosi: u16,
    /// Data-in sampled on each rising SCLK edge, first edge in the MSB.
    pub miso: u16,
}

impl DecodedFrame {
    /// Channel address carried on the data-out line.
    pub fn channel(&self) -> Channel {
        let first_edge = CHANNEL_FIRST_PULSE + 1;
        Channel::from_bits_msb_first(
            (first_edge..first_edge + CHANNEL_BITS)
                .map(|edge| (self.mosi >> (PULSES_PER_FRAME - 1 - edge)) & 1 == 1),
        )
    }

    /// Conversion result in the low `resolution` bits of the data-in word.
    pub fn sample(&self, resolution: u8) -> u16 {
        self.miso & mask(resolution)
    }
}

/// Bus decoder driven one tick at a time.
///
/// Watches select, clock and both data lines, and reports a frame when
/// select de-asserts. Frames that did not see exactly 16 pulses are counted
/// and dropped.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    prev_sclk: bool,
    in_frame: bool,
    mosi: u16,
    miso: u16,
    falling_edges: u32,
    rising_edges: u32,
    frames: u64,
    dropped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            prev_sclk: true,
            in_frame: false,
            mosi: 0,
            miso: 0,
            falling_edges: 0,
            rising_edges: 0,
            frames: 0,
            dropped: 0,
        }
    }

    /// Process one tick of bus activity.
    /// Returns the frame when select goes inactive after a complete transfer.
    pub fn process(&mut self, lines: Lines, miso: bool) -> Option<DecodedFrame> {
        let prev_sclk = self.prev_sclk;
        self.prev_sclk = lines.sclk;

        if !self.in_frame && !lines.chip_select_n {
            self.in_frame = true;
            self.mosi = 0;
            self.miso = 0;
            self.falling_edges = 0;
            self.rising_edges = 0;
        }

        if !self.in_frame {
            return None;
        }

        if lines.chip_select_n {
            self.in_frame = false;
            if self.falling_edges == PULSES_PER_FRAME && self.rising_edges == PULSES_PER_FRAME {
                self.frames += 1;
                return Some(DecodedFrame {
                    mosi: self.mosi,
                    miso: self.miso,
                });
            }
            self.dropped += 1;
            log::warn!(
                "monitor: dropped frame with {} falling / {} rising edges",
                self.falling_edges,
                self.rising_edges
            );
            return None;
        }

        if prev_sclk && !lines.sclk {
            self.mosi = (self.mosi << 1) | lines.mosi as u16;
            self.falling_edges += 1;
        } else if !prev_sclk && lines.sclk {
            self.miso = (self.miso << 1) | miso as u16;
            self.rising_edges += 1;
        }
        None
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
