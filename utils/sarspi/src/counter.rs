//! Frame counter decoding.
//!
//! The free-running counter is split into a frame-position field (the low
//! `frame_bits`) and an idle field above it. A frame is active while the idle
//! field is zero. Inside the frame the position is further split into the
//! pulse index (16 pulses) and the phase within the pulse.

use crate::config::EngineConfig;
use crate::delay_line::DelayLine;
use crate::error::ConfigError;

/// Serial clock pulses per frame.
pub const PULSES_PER_FRAME: u32 = 16;
const PULSE_INDEX_BITS: u8 = 4;

/// Compiled timing derived from an [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    sclk_bit: u8,
    pulse_shift: u8,
    frame_bits: u8,
    counter_mask: u32,
    clock_delay: u8,
    data_delay: u8,
    tick_rate_hz: u32,
}

/// Margins of the data-out line around the visible falling SCLK edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingBudget {
    pub tick_ns: f64,
    pub sclk_hz: f64,
    pub sample_rate_hz: f64,
    pub setup_ticks: i64,
    pub hold_ticks: i64,
}

impl TimingBudget {
    pub fn setup_ns(&self) -> f64 {
        self.setup_ticks as f64 * self.tick_ns
    }

    pub fn hold_ns(&self) -> f64 {
        self.hold_ticks as f64 * self.tick_ns
    }
}

impl Timing {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        if config.sclk_bit == 0 {
            return Err(ConfigError::ClockTooFast(config.sclk_bit));
        }
        if config.idle_bits == 0 {
            return Err(ConfigError::NoIdleWindow);
        }
        let pulse_shift = config.sclk_bit.saturating_add(1);
        let frame_bits = pulse_shift.saturating_add(PULSE_INDEX_BITS);
        let width = frame_bits as u32 + config.idle_bits as u32;
        if width > 32 {
            return Err(ConfigError::CounterTooWide {
                frame_bits,
                idle_bits: config.idle_bits,
            });
        }
        let counter_mask = if width == 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        };

        let timing = Self {
            sclk_bit: config.sclk_bit,
            pulse_shift,
            frame_bits,
            counter_mask,
            clock_delay: config.clock_delay,
            data_delay: config.data_delay,
            tick_rate_hz: config.tick_rate_hz,
        };

        // The visible falling edge must not come after the sampling tick, and
        // the last visible rising edge must precede deselect.
        let max_clock_delay = (timing.sample_phase() - 1).min(DelayLine::MAX_DEPTH as u32) as u8;
        if config.clock_delay == 0 || config.clock_delay > max_clock_delay {
            return Err(ConfigError::ClockDelay {
                delay: config.clock_delay,
                max: max_clock_delay,
                ticks_per_pulse: timing.ticks_per_pulse(),
            });
        }

        let (setup, hold) = timing.data_margins();
        if config.data_delay == 0
            || config.data_delay > DelayLine::MAX_DEPTH
            || setup < 1
            || hold < 1
        {
            return Err(ConfigError::DataDelay {
                delay: config.data_delay,
                setup,
                hold,
            });
        }

        if !(1..=16).contains(&config.resolution) {
            return Err(ConfigError::Resolution(config.resolution));
        }
        config.latch.check(config.resolution)?;

        Ok(timing)
    }

    pub fn ticks_per_pulse(&self) -> u32 {
        1 << self.pulse_shift
    }

    /// Ticks in the active window.
    pub fn frame_ticks(&self) -> u32 {
        1 << self.frame_bits
    }

    /// Ticks between the starts of two consecutive frames.
    pub fn period_ticks(&self) -> u64 {
        self.counter_mask as u64 + 1
    }

    pub fn frame_bits(&self) -> u8 {
        self.frame_bits
    }

    /// Width of the frame counter register.
    pub fn counter_bits(&self) -> u8 {
        self.counter_mask.count_ones() as u8
    }

    pub fn clock_delay(&self) -> u8 {
        self.clock_delay
    }

    pub fn data_delay(&self) -> u8 {
        self.data_delay
    }

    /// Ticks from the raw clock bit to the SCLK pin: launch register plus
    /// delay line.
    pub fn clock_lag(&self) -> u32 {
        self.clock_delay as u32 + 1
    }

    /// Ticks from the encoded bit to the data-out pin.
    pub fn data_lag(&self) -> u32 {
        self.data_delay as u32 + 1
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn next(&self, counter: u32) -> u32 {
        counter.wrapping_add(1) & self.counter_mask
    }

    pub fn is_active(&self, counter: u32) -> bool {
        (counter & self.counter_mask) >> self.frame_bits == 0
    }

    pub fn position(&self, counter: u32) -> u32 {
        counter & (self.frame_ticks() - 1)
    }

    pub fn pulse(&self, counter: u32) -> u32 {
        self.position(counter) >> self.pulse_shift
    }

    pub fn phase(&self, counter: u32) -> u32 {
        counter & (self.ticks_per_pulse() - 1)
    }

    /// Counter bit feeding the serial clock.
    pub fn sclk_phase_bit(&self, counter: u32) -> bool {
        (counter >> self.sclk_bit) & 1 == 1
    }

    /// Phase at which the input line is sampled: first tick of the internal
    /// high half, pattern `10` with the reference clock. With the reference
    /// lag this is the tick in which the falling edge reaches the pin, and the
    /// sample is taken at its end.
    pub fn sample_phase(&self) -> u32 {
        self.ticks_per_pulse() / 2
    }

    pub fn is_frame_start(&self, counter: u32) -> bool {
        self.is_active(counter) && self.position(counter) == 0
    }

    pub fn is_sample_tick(&self, counter: u32) -> bool {
        self.is_active(counter) && self.phase(counter) == self.sample_phase()
    }

    pub fn is_latch_tick(&self, counter: u32) -> bool {
        self.is_active(counter) && self.position(counter) == self.frame_ticks() - 1
    }

    /// Setup and hold, in ticks, of a data-out bit around the visible falling
    /// edge that follows it.
    fn data_margins(&self) -> (i64, i64) {
        let ticks = self.ticks_per_pulse() as i64;
        let clock = self.clock_lag() as i64;
        let data = self.data_lag() as i64;
        (ticks + clock - data, data - clock - 1)
    }

    pub fn budget(&self) -> TimingBudget {
        let (setup_ticks, hold_ticks) = self.data_margins();
        let rate = self.tick_rate_hz as f64;
        TimingBudget {
            tick_ns: 1e9 / rate,
            sclk_hz: rate / self.ticks_per_pulse() as f64,
            sample_rate_hz: rate / self.period_ticks() as f64,
            setup_ticks,
            hold_ticks,
        }
    }
}
