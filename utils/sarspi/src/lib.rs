mod adc;
mod capture;
mod clocking;
mod config;
mod counter;
mod delay_line;
mod encoder;
mod engine;
mod error;
mod monitor;
mod simulator;
mod vcd;

// Re-export public API
pub use adc::{AdcModel, ConstantLevel, SerialDevice};
pub use capture::{LatchWindow, SampleHandle};
pub use config::{EngineConfig, REFERENCE_TICK_RATE_HZ};
pub use counter::{PULSES_PER_FRAME, Timing, TimingBudget};
pub use delay_line::DelayLine;
pub use encoder::Channel;
pub use engine::{Engine, EngineParams, EngineState, Lines, TickEvents, TickInputs, advance};
pub use error::{ConfigError, Error};
pub use monitor::{DecodedFrame, FrameDecoder};
pub use simulator::{FrameRecord, Simulator, TickReport};
pub use vcd::{BusTrace, VarId, VcdWriter};
