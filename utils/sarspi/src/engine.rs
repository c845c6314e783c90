//! The tick-driven protocol engine.
//!
//! Every register of the design lives in [`EngineState`]. [`advance`] computes
//! the complete next state from the previous one and the inputs sampled on
//! that tick, so no output ever feeds back into the same tick.
//!
//! Select is a single output register. The serial clock and data-out bits
//! pass through a launch register and then their delay lines, so the serial
//! lines always trail select by at least one tick.

use crate::capture::{LatchWindow, SampleHandle, shift_in};
use crate::clocking::{chip_select_n, raw_sclk};
use crate::config::EngineConfig;
use crate::counter::Timing;
use crate::delay_line::DelayLine;
use crate::encoder::{Channel, encode_bit};
use crate::error::ConfigError;

/// External inputs read on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickInputs {
    /// Selector value, only taken at the first position of a frame.
    pub channel: Channel,
    /// Serial data from the converter, only taken at sampling ticks.
    pub miso: bool,
}

/// Levels currently driven onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lines {
    pub chip_select_n: bool,
    pub sclk: bool,
    pub mosi: bool,
}

impl Lines {
    pub const IDLE: Lines = Lines {
        chip_select_n: true,
        sclk: true,
        mosi: false,
    };
}

/// Register contents after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    pub counter: u32,
    chip_select_n: bool,
    sclk_launch: bool,
    mosi_launch: bool,
    sclk: DelayLine,
    mosi: DelayLine,
    pub channel: Channel,
    pub shift: u16,
    pub latched: u16,
}

impl EngineState {
    /// Power-up state: counter at zero, bus idle.
    pub fn reset(timing: &Timing) -> Self {
        Self {
            counter: 0,
            chip_select_n: true,
            sclk_launch: true,
            mosi_launch: false,
            sclk: DelayLine::new(timing.clock_delay(), true),
            mosi: DelayLine::new(timing.data_delay(), false),
            channel: Channel::default(),
            shift: 0,
            latched: 0,
        }
    }

    pub fn lines(&self) -> Lines {
        Lines {
            chip_select_n: self.chip_select_n,
            sclk: self.sclk.tail(),
            mosi: self.mosi.tail(),
        }
    }
}

/// Side effects of one tick, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub channel_captured: Option<Channel>,
    pub sampled: Option<bool>,
    pub latched: Option<u16>,
}

/// Everything that stays fixed while the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParams {
    pub timing: Timing,
    pub latch: LatchWindow,
    pub resolution: u8,
}

impl EngineParams {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            timing: Timing::new(config)?,
            latch: config.latch,
            resolution: config.resolution,
        })
    }
}

/// Pure one-tick transition.
pub fn advance(
    params: &EngineParams,
    state: &EngineState,
    inputs: TickInputs,
) -> (EngineState, TickEvents) {
    let timing = &params.timing;
    let counter = state.counter;
    let mut events = TickEvents::default();

    let channel = if timing.is_frame_start(counter) {
        events.channel_captured = Some(inputs.channel);
        inputs.channel
    } else {
        state.channel
    };

    let shift = if timing.is_sample_tick(counter) {
        events.sampled = Some(inputs.miso);
        shift_in(state.shift, inputs.miso, params.resolution)
    } else {
        state.shift
    };

    let latched = if timing.is_latch_tick(counter) {
        let value = params.latch.extract(state.shift, params.resolution);
        events.latched = Some(value);
        value
    } else {
        state.latched
    };

    let next = EngineState {
        counter: timing.next(counter),
        chip_select_n: chip_select_n(timing, counter),
        sclk_launch: raw_sclk(timing, counter),
        mosi_launch: encode_bit(timing, state.channel, counter),
        sclk: state.sclk.push(state.sclk_launch),
        mosi: state.mosi.push(state.mosi_launch),
        channel,
        shift,
        latched,
    };

    (next, events)
}

/// Stateful wrapper around [`advance`] that publishes every latched sample.
#[derive(Debug, Clone)]
pub struct Engine {
    params: EngineParams,
    state: EngineState,
    handle: SampleHandle,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let params = EngineParams::new(config)?;
        let budget = params.timing.budget();
        log::info!(
            "engine: {} ticks/frame, period {} ticks, sclk {:.3} MHz, latch bits {:?} of {}",
            params.timing.frame_ticks(),
            params.timing.period_ticks(),
            budget.sclk_hz / 1e6,
            params.latch.bounds(params.resolution),
            params.resolution
        );
        Ok(Self {
            state: EngineState::reset(&params.timing),
            params,
            handle: SampleHandle::new(),
        })
    }

    pub fn step(&mut self, inputs: TickInputs) -> TickEvents {
        let (next, events) = advance(&self.params, &self.state, inputs);
        if let Some(value) = events.latched {
            self.handle.publish(value);
            log::debug!(
                "frame {} latched {:#06x} on {}",
                self.handle.frames(),
                value,
                self.state.channel
            );
        }
        self.state = next;
        events
    }

    pub fn lines(&self) -> Lines {
        self.state.lines()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn timing(&self) -> &Timing {
        &self.params.timing
    }

    pub fn latched(&self) -> u16 {
        self.state.latched
    }

    /// Handle for readers outside the tick loop.
    pub fn sample_handle(&self) -> SampleHandle {
        self.handle.clone()
    }
}
