use thiserror::Error;

/// Configuration misuse detected before the engine starts ticking.
///
/// The engine itself has no runtime failure modes; every rule here guards a
/// timing relationship that would otherwise only show up on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sclk_bit {0} leaves no mid-pulse sampling phase (needs >= 1)")]
    ClockTooFast(u8),

    #[error("counter needs {frame_bits} frame bits + {idle_bits} idle bits, more than 32")]
    CounterTooWide { frame_bits: u8, idle_bits: u8 },

    #[error("idle_bits must be at least 1, chip select would never de-assert")]
    NoIdleWindow,

    #[error("clock delay {delay} out of range 1..={max} for {ticks_per_pulse} ticks per pulse")]
    ClockDelay {
        delay: u8,
        max: u8,
        ticks_per_pulse: u32,
    },

    #[error(
        "data delay {delay} gives setup {setup} / hold {hold} ticks around the falling SCLK edge, both must be >= 1"
    )]
    DataDelay { delay: u8, setup: i64, hold: i64 },

    #[error("resolution {0} out of range 1..=16 bits")]
    Resolution(u8),

    #[error("latch window bits {msb}..={lsb} does not fit a {resolution}-bit sample")]
    LatchWindow { msb: u8, lsb: u8, resolution: u8 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("channel {0} out of range 0..=7")]
    InvalidChannel(u8),

    #[error("{0} converter inputs for 8 channels")]
    TooManyInputs(usize),

    #[error("bus produced {decoded} of {requested} frames within {ticks} ticks")]
    Stalled {
        decoded: usize,
        requested: usize,
        ticks: u64,
    },

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
