use std::path::Path;

use anyhow::{Context, Result};
use sarspi::{AdcModel, Channel, ConstantLevel, EngineConfig, FrameRecord, SerialDevice, Simulator};
use serde::Deserialize;

/// What drives the data-in line during a scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MisoSource {
    /// Converter model. One value drives every channel, otherwise values are
    /// assigned from channel 0 upwards.
    Adc(Vec<u16>),
    /// Line tied high or low.
    Constant(bool),
}

/// Expected bus activity, frame by frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Channel that must appear on the data-out line in every frame.
    pub channel: Option<Channel>,
    /// Data-in words as seen on the bus.
    pub miso: Option<Vec<u16>>,
    /// Engine output after each frame.
    pub latched: Vec<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub channel: Channel,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub miso: MisoSource,
    pub expect: Expectation,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    pub fn frames(&self) -> usize {
        self.expect.latched.len()
    }
}

/// Frames observed while running a scenario.
#[derive(Debug)]
pub struct ScenarioResult {
    pub records: Vec<FrameRecord>,
    pub dropped: u64,
}

fn simulate<D: SerialDevice>(
    scenario: &Scenario,
    device: D,
    vcd_path: Option<&Path>,
) -> Result<ScenarioResult> {
    let mut sim = Simulator::new(&scenario.config, device).context("Failed to create simulator")?;
    sim.set_channel(scenario.channel);
    if let Some(path) = vcd_path {
        sim.open_vcd(path).context("Failed to open VCD trace")?;
    }
    let records = sim.run_frames(scenario.frames()).context("Simulation failed")?;
    sim.close_vcd()?;
    Ok(ScenarioResult {
        records,
        dropped: sim.decoder().dropped(),
    })
}

pub fn run_scenario(scenario: &Scenario, vcd_path: Option<&Path>) -> Result<ScenarioResult> {
    match &scenario.miso {
        MisoSource::Constant(level) => simulate(scenario, ConstantLevel(*level), vcd_path),
        MisoSource::Adc(values) => {
            let adc = AdcModel::from_inputs(values).context("Invalid converter inputs")?;
            simulate(scenario, adc, vcd_path)
        }
    }
}

pub fn compare_results(expect: &Expectation, result: &ScenarioResult) -> Result<()> {
    let mut mismatches = Vec::new();

    if result.dropped > 0 {
        mismatches.push(format!("{} incomplete frames on the bus", result.dropped));
    }

    for (n, record) in result.records.iter().enumerate() {
        if let Some(channel) = expect.channel {
            if record.channel != channel {
                mismatches.push(format!(
                    "frame {}: channel {}, expected {}",
                    n, record.channel, channel
                ));
            }
        }
        if let Some(miso) = expect.miso.as_ref().and_then(|words| words.get(n)) {
            if record.miso != *miso {
                mismatches.push(format!(
                    "frame {}: miso 0x{:04x}, expected 0x{:04x}",
                    n, record.miso, miso
                ));
            }
        }
        if let Some(latched) = expect.latched.get(n) {
            if record.latched != *latched {
                mismatches.push(format!(
                    "frame {}: latched 0x{:04x}, expected 0x{:04x}",
                    n, record.latched, latched
                ));
            }
        }
    }

    if !mismatches.is_empty() {
        anyhow::bail!("Frame mismatches:\n{}", mismatches.join("\n"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "
description: reference
config:
  idle_bits: 1
channel: 5
miso:
  adc: [0xCA1]
expect:
  channel: 5
  latched: [0x94, 0x94]
";

    #[test]
    fn test_parse_scenario() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.frames(), 2);
        assert_eq!(scenario.config.idle_bits, 1);
        assert_eq!(scenario.channel.index(), 5);
        assert!(matches!(scenario.miso, MisoSource::Adc(ref v) if v == &[0xCA1]));
    }

    #[test]
    fn test_run_and_compare() {
        let scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        let result = run_scenario(&scenario, None).unwrap();
        compare_results(&scenario.expect, &result).unwrap();
    }

    #[test]
    fn test_mismatch_is_reported() {
        let mut scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        scenario.expect.latched = vec![0x94, 0x95];
        let result = run_scenario(&scenario, None).unwrap();
        let err = compare_results(&scenario.expect, &result).unwrap_err();
        assert!(err.to_string().contains("frame 1: latched 0x0094, expected 0x0095"));
    }

    #[test]
    fn test_scenario_files_load_and_pass() {
        let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/*.yaml");
        let mut count = 0;
        for path in glob::glob(pattern).unwrap() {
            let path = path.unwrap();
            let scenario = Scenario::load(&path).unwrap();
            let result = run_scenario(&scenario, None).unwrap();
            if let Err(e) = compare_results(&scenario.expect, &result) {
                panic!("{}: {:#}", path.display(), e);
            }
            count += 1;
        }
        assert!(count >= 6, "found {} scenario files", count);
    }

    #[test]
    fn test_latch_window_in_scenario() {
        let yaml = "
config:
  latch:
    bits:
      msb: 11
      lsb: 4
miso:
  constant: true
expect:
  latched: [0xFF]
";
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.config.latch, sarspi::LatchWindow::Bits { msb: 11, lsb: 4 });
        assert!(matches!(scenario.miso, MisoSource::Constant(true)));
    }

    #[test]
    fn test_too_many_inputs() {
        let mut scenario: Scenario = serde_yaml::from_str(SCENARIO).unwrap();
        scenario.miso = MisoSource::Adc(vec![0; 9]);
        assert!(run_scenario(&scenario, None).is_err());
    }
}
