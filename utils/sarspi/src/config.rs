use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capture::LatchWindow;
use crate::counter::Timing;
use crate::error::{ConfigError, Error};

/// Reference tick source: 32 MHz.
pub const REFERENCE_TICK_RATE_HZ: u32 = 32_000_000;

/// Engine parameters. Defaults reproduce the reference design bit-exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Rate of the driving tick, only used for timing reports and traces.
    pub tick_rate_hz: u32,
    /// Counter bit that forms the raw serial clock. Bit 1 gives one pulse per
    /// four ticks.
    pub sclk_bit: u8,
    /// Counter bits above the frame position. The engine is idle while any of
    /// them is set.
    pub idle_bits: u8,
    /// Depth of the serial clock delay line.
    pub clock_delay: u8,
    /// Depth of the data-out delay line.
    pub data_delay: u8,
    /// Width of the sample shift register.
    pub resolution: u8,
    /// Written as `reference`, `full` or `bits: {msb: .., lsb: ..}`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub latch: LatchWindow,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: REFERENCE_TICK_RATE_HZ,
            sclk_bit: 1,
            idle_bits: 7,
            clock_delay: 1,
            data_delay: 3,
            resolution: 12,
            latch: LatchWindow::Reference,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every timing rule without building an engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Timing::new(self).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = EngineConfig::from_yaml("latch: full\nidle_bits: 2\n").unwrap();
        assert_eq!(config.latch, LatchWindow::Full);
        assert_eq!(config.idle_bits, 2);
        assert_eq!(config.sclk_bit, 1);
        assert_eq!(config.data_delay, 3);
    }

    #[test]
    fn test_custom_latch_window_yaml() {
        let yaml = r#"
latch:
  bits:
    msb: 11
    lsb: 4
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.latch, LatchWindow::Bits { msb: 11, lsb: 4 });
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        assert!(matches!(
            EngineConfig::from_yaml("sclk_bit: 0\n"),
            Err(Error::Config(ConfigError::ClockTooFast(0)))
        ));
        assert!(matches!(
            EngineConfig::from_yaml("bogus: 1\n"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = EngineConfig {
            latch: LatchWindow::Bits { msb: 9, lsb: 2 },
            ..Default::default()
        };
        let text = config.to_yaml().unwrap();
        assert_eq!(EngineConfig::from_yaml(&text).unwrap(), config);
    }
}
