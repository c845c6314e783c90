use crate::capture::mask;
use crate::counter::PULSES_PER_FRAME;
use crate::encoder::{CHANNEL_BITS, CHANNEL_FIRST_PULSE, Channel};
use crate::engine::Lines;
use crate::error::Error;

/// Anything that drives the serial data-in line of the engine.
pub trait SerialDevice {
    /// Observe the bus for one tick and return the level driven on MISO.
    fn drive(&mut self, lines: Lines) -> bool;
}

/// A line tied to a fixed level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantLevel(pub bool);

impl SerialDevice for ConstantLevel {
    fn drive(&mut self, _lines: Lines) -> bool {
        self.0
    }
}

/// Behavioural model of an 8-channel, 12-bit SAR converter with an SPI-style
/// interface.
///
/// Select going low starts a frame with DOUT low. Each falling SCLK edge
/// shifts out the next bit of the 16-bit output word (four leading zeros,
/// then the conversion MSB first) and samples DIN. The address collected on
/// falling edges 2..=4 selects the channel converted in the *next* frame, so
/// the first frame after power-up always converts channel 0.
#[derive(Debug, Clone)]
pub struct AdcModel {
    inputs: [u16; Channel::COUNT],
    prev: Lines,
    falling_edges: u32,
    address: u8,
    converting: Channel,
    next_channel: Channel,
    word: u16,
    dout: bool,
}

impl AdcModel {
    pub const RESOLUTION: u8 = 12;
    const LEADING_ZEROS: u32 = PULSES_PER_FRAME - Self::RESOLUTION as u32;

    /// A converter whose inputs read `inputs[channel]` (only the low 12 bits
    /// are used).
    pub fn new(inputs: [u16; Channel::COUNT]) -> Self {
        Self {
            inputs: inputs.map(|value| value & mask(Self::RESOLUTION)),
            prev: Lines::IDLE,
            falling_edges: 0,
            address: 0,
            converting: Channel::default(),
            next_channel: Channel::default(),
            word: 0,
            dout: false,
        }
    }

    /// Every channel reads `value`.
    pub fn uniform(value: u16) -> Self {
        Self::new([value; Channel::COUNT])
    }

    /// Build a converter from a value list: a single value drives every
    /// channel, otherwise values go to channel 0 upwards and the rest read 0.
    pub fn from_inputs(values: &[u16]) -> Result<Self, Error> {
        match values {
            [value] => Ok(Self::uniform(*value)),
            values if values.len() > Channel::COUNT => Err(Error::TooManyInputs(values.len())),
            values => {
                let mut adc = Self::uniform(0);
                for (channel, value) in Channel::all().zip(values.iter().copied()) {
                    adc.set_input(channel, value);
                }
                Ok(adc)
            }
        }
    }

    pub fn set_input(&mut self, channel: Channel, value: u16) {
        self.inputs[channel.index() as usize] = value & mask(Self::RESOLUTION);
    }

    /// Channel converted in the current (or last) frame.
    pub fn converting(&self) -> Channel {
        self.converting
    }

    /// Channel that will be converted in the next frame.
    pub fn next_channel(&self) -> Channel {
        self.next_channel
    }

    fn address_edges() -> std::ops::Range<u32> {
        // Data-out bits straddle the falling edge that ends their pulse.
        let first = CHANNEL_FIRST_PULSE + 1;
        first..first + CHANNEL_BITS
    }

    fn on_select(&mut self) {
        self.converting = self.next_channel;
        self.word = self.inputs[self.converting.index() as usize];
        self.falling_edges = 0;
        self.address = 0;
        self.dout = false;
    }

    fn on_falling_edge(&mut self, din: bool) {
        let edge = self.falling_edges;
        if edge < PULSES_PER_FRAME {
            self.dout = edge >= Self::LEADING_ZEROS
                && (self.word >> (PULSES_PER_FRAME - 1 - edge)) & 1 == 1;
        }
        if Self::address_edges().contains(&edge) {
            self.address = (self.address << 1) | din as u8;
        }
        self.falling_edges += 1;
    }

    fn on_deselect(&mut self) {
        if self.falling_edges >= Self::address_edges().end {
            self.next_channel = Channel::from_bits_msb_first(
                (0..CHANNEL_BITS).map(|n| (self.address >> (CHANNEL_BITS - 1 - n)) & 1 == 1),
            );
        } else {
            log::warn!(
                "adc: frame ended after {} clocks, keeping {}",
                self.falling_edges,
                self.next_channel
            );
        }
        self.dout = false;
    }
}

impl SerialDevice for AdcModel {
    fn drive(&mut self, lines: Lines) -> bool {
        let prev = self.prev;
        self.prev = lines;

        if prev.chip_select_n && !lines.chip_select_n {
            self.on_select();
        }
        if !lines.chip_select_n && prev.sclk && !lines.sclk {
            self.on_falling_edge(lines.mosi);
        }
        if !prev.chip_select_n && lines.chip_select_n {
            self.on_deselect();
        }
        self.dout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(chip_select_n: bool, sclk: bool, mosi: bool) -> Lines {
        Lines {
            chip_select_n,
            sclk,
            mosi,
        }
    }

    /// Clock one frame into the model: each pulse is a falling then a rising
    /// edge, with `address` on pulses 1..=3. Returns DOUT after every falling
    /// edge.
    fn clock_frame(adc: &mut AdcModel, address: u8) -> Vec<bool> {
        adc.drive(Lines::IDLE);
        adc.drive(lines(false, true, false));
        let mut out = Vec::new();
        let mut pending = false;
        for pulse in 0..16u32 {
            out.push(adc.drive(lines(false, false, pending)));
            adc.drive(lines(false, true, pending));
            pending = (1..=3).contains(&pulse) && (address >> (3 - pulse)) & 1 == 1;
        }
        adc.drive(Lines::IDLE);
        out
    }

    fn word(bits: &[bool]) -> u16 {
        bits.iter().fold(0, |acc, &bit| (acc << 1) | bit as u16)
    }

    #[test]
    fn test_shifts_out_conversion_after_leading_zeros() {
        let mut adc = AdcModel::uniform(0xCA1);
        let out = clock_frame(&mut adc, 0);
        assert!(out[..4].iter().all(|bit| !bit));
        assert_eq!(word(&out), 0x0CA1);
    }

    #[test]
    fn test_address_applies_to_next_frame() {
        let mut inputs = [0u16; 8];
        for (channel, value) in inputs.iter_mut().enumerate() {
            *value = 0x100 * channel as u16 + 1;
        }
        let mut adc = AdcModel::new(inputs);

        assert_eq!(word(&clock_frame(&mut adc, 5)), 0x001);
        assert_eq!(adc.next_channel().index(), 5);
        assert_eq!(word(&clock_frame(&mut adc, 2)), 0x501);
        assert_eq!(adc.converting().index(), 5);
        assert_eq!(word(&clock_frame(&mut adc, 2)), 0x201);
    }

    #[test]
    fn test_short_frame_keeps_address() {
        let mut adc = AdcModel::uniform(0);
        clock_frame(&mut adc, 6);
        adc.drive(lines(false, true, false));
        adc.drive(lines(false, false, true));
        adc.drive(Lines::IDLE);
        assert_eq!(adc.next_channel().index(), 6);
    }

    #[test]
    fn test_inputs_are_masked() {
        let mut adc = AdcModel::uniform(0xFFFF);
        adc.set_input(Channel::default(), 0xF123);
        assert_eq!(word(&clock_frame(&mut adc, 0)), 0x0123);
    }

    #[test]
    fn test_from_inputs() {
        let mut adc = AdcModel::from_inputs(&[0x456]).unwrap();
        assert_eq!(word(&clock_frame(&mut adc, 3)), 0x456);
        assert_eq!(word(&clock_frame(&mut adc, 0)), 0x456);

        let mut adc = AdcModel::from_inputs(&[0x111, 0x222]).unwrap();
        assert_eq!(word(&clock_frame(&mut adc, 1)), 0x111);
        assert_eq!(word(&clock_frame(&mut adc, 2)), 0x222);
        assert_eq!(word(&clock_frame(&mut adc, 0)), 0x000);

        assert!(AdcModel::from_inputs(&[0; 8]).is_ok());
        assert!(matches!(
            AdcModel::from_inputs(&[0; 9]),
            Err(Error::TooManyInputs(9))
        ));
    }

    #[test]
    fn test_constant_level() {
        assert!(ConstantLevel(true).drive(Lines::IDLE));
        assert!(!ConstantLevel(false).drive(Lines::IDLE));
    }
}
