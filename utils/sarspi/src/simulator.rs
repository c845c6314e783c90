use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::adc::SerialDevice;
use crate::config::EngineConfig;
use crate::encoder::Channel;
use crate::engine::{Engine, Lines, TickEvents, TickInputs};
use crate::error::Error;
use crate::monitor::{DecodedFrame, FrameDecoder};
use crate::vcd::BusTrace;

/// What happened on the bus during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub lines: Lines,
    pub miso: bool,
    pub events: TickEvents,
    pub frame: Option<DecodedFrame>,
}

/// One completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub index: u64,
    /// Address decoded from the data-out line.
    pub channel: Channel,
    /// Full 16-bit data-in word seen on the bus.
    pub miso: u16,
    /// Engine output after the frame.
    pub latched: u16,
}

/// Engine plus the device on the other end of the bus.
pub struct Simulator<D: SerialDevice> {
    engine: Engine,
    device: D,
    decoder: FrameDecoder,
    channel: Channel,
    ticks: u64,
    trace: Option<BusTrace<BufWriter<File>>>,
}

impl<D: SerialDevice> Simulator<D> {
    pub fn new(config: &EngineConfig, device: D) -> Result<Self, Error> {
        Ok(Self {
            engine: Engine::new(config)?,
            device,
            decoder: FrameDecoder::new(),
            channel: Channel::default(),
            ticks: 0,
            trace: None,
        })
    }

    /// Selector input, taken by the engine at the start of the next frame.
    pub fn set_channel(&mut self, channel: Channel) {
        self.channel = channel;
    }

    /// Start tracing every following tick to a VCD file.
    pub fn open_vcd<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let file = File::create(path.as_ref())?;
        let timing = self.engine.timing();
        let params = self.engine.params();
        self.trace = Some(BusTrace::new(
            BufWriter::new(file),
            timing.tick_rate_hz(),
            timing.counter_bits(),
            params.resolution,
            params.latch.width(params.resolution),
        ));
        log::info!("tracing to {}", path.as_ref().display());
        Ok(())
    }

    pub fn close_vcd(&mut self) -> Result<(), Error> {
        if let Some(trace) = self.trace.take() {
            trace.finish()?;
            log::info!("trace closed after {} ticks", self.ticks);
        }
        Ok(())
    }

    pub fn tick(&mut self) -> Result<TickReport, Error> {
        let lines = self.engine.lines();
        let miso = self.device.drive(lines);

        if let Some(trace) = &mut self.trace {
            trace.dump(self.ticks, self.engine.state(), lines, miso)?;
        }

        let frame = self.decoder.process(lines, miso);
        let events = self.engine.step(TickInputs {
            channel: self.channel,
            miso,
        });
        self.ticks += 1;

        Ok(TickReport {
            lines,
            miso,
            events,
            frame,
        })
    }

    /// Tick until `frames` transfers have completed on the bus.
    pub fn run_frames(&mut self, frames: usize) -> Result<Vec<FrameRecord>, Error> {
        let limit = self.frame_limit(frames);
        let mut records = Vec::new();
        let mut spent = 0;
        while records.len() < frames {
            if spent >= limit {
                return Err(Error::Stalled {
                    decoded: records.len(),
                    requested: frames,
                    ticks: spent,
                });
            }
            if let Some(frame) = self.tick()?.frame {
                records.push(FrameRecord {
                    index: self.decoder.frames(),
                    channel: frame.channel(),
                    miso: frame.miso,
                    latched: self.engine.latched(),
                });
            }
            spent += 1;
        }
        Ok(records)
    }

    /// Tick budget for `frames` frames, one spare period for the first frame
    /// to line up.
    fn frame_limit(&self, frames: usize) -> u64 {
        (frames as u64)
            .saturating_add(1)
            .saturating_mul(self.engine.timing().period_ticks())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }
}

impl<D: SerialDevice> Drop for Simulator<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close_vcd() {
            log::warn!("failed to close trace: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::{AdcModel, ConstantLevel};
    use crate::capture::LatchWindow;

    fn config(latch: LatchWindow) -> EngineConfig {
        EngineConfig {
            idle_bits: 1,
            latch,
            ..Default::default()
        }
    }

    fn channel(value: u8) -> Channel {
        Channel::try_from(value).unwrap()
    }

    #[test]
    fn test_reference_scenario_against_adc() {
        let mut sim =
            Simulator::new(&config(LatchWindow::Reference), AdcModel::uniform(0xCA1)).unwrap();
        sim.set_channel(channel(0b101));
        let records = sim.run_frames(3).unwrap();
        for record in &records {
            assert_eq!(record.channel, channel(0b101));
            assert_eq!(record.miso, 0x0CA1);
            assert_eq!(record.latched, 0x94);
        }
        assert_eq!(records.iter().map(|r| r.index).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(sim.device().next_channel(), channel(0b101));
    }

    #[test]
    fn test_full_resolution_against_adc() {
        let mut sim = Simulator::new(&config(LatchWindow::Full), AdcModel::uniform(0xCA1)).unwrap();
        let records = sim.run_frames(2).unwrap();
        assert!(records.iter().all(|r| r.latched == 0xCA1));
    }

    #[test]
    fn test_adc_address_is_pipelined() {
        let mut inputs = [0u16; 8];
        for (n, value) in inputs.iter_mut().enumerate() {
            *value = 0x111 * n as u16;
        }
        let mut sim = Simulator::new(&config(LatchWindow::Full), AdcModel::new(inputs)).unwrap();
        sim.set_channel(channel(3));
        let latched: Vec<u16> = sim.run_frames(3).unwrap().iter().map(|r| r.latched).collect();
        assert_eq!(latched, [0x000, 0x333, 0x333]);

        sim.set_channel(channel(6));
        let latched: Vec<u16> = sim.run_frames(2).unwrap().iter().map(|r| r.latched).collect();
        assert_eq!(latched, [0x333, 0x666]);
    }

    #[test]
    fn test_constant_miso() {
        let mut sim = Simulator::new(&config(LatchWindow::Full), ConstantLevel(true)).unwrap();
        let records = sim.run_frames(2).unwrap();
        assert!(records.iter().all(|r| r.miso == 0xFFFF && r.latched == 0xFFF));
        assert_eq!(sim.decoder().dropped(), 0);
    }

    #[test]
    fn test_frame_spacing() {
        let mut sim = Simulator::new(&EngineConfig::default(), ConstantLevel(false)).unwrap();
        sim.run_frames(1).unwrap();
        let first = sim.ticks();
        sim.run_frames(1).unwrap();
        assert_eq!(sim.ticks() - first, sim.engine().timing().period_ticks());
    }

    #[test]
    fn test_vcd_trace_written() {
        let path = std::env::temp_dir().join(format!("sarspi-{}.vcd", std::process::id()));
        let mut sim = Simulator::new(&config(LatchWindow::Full), ConstantLevel(true)).unwrap();
        sim.open_vcd(&path).unwrap();
        sim.run_frames(1).unwrap();
        sim.close_vcd().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(text.contains("$var wire 1 \" cs_n $end"));
        assert!(text.contains("$var wire 7 ! frame_counter $end"));
        assert!(text.contains("$var wire 12 ' shift $end"));
        assert!(text.contains("$var wire 12 ( latched $end"));
        assert!(text.contains("#31250\n"));
    }

    #[test]
    fn test_reference_trace_declares_window_width() {
        let path = std::env::temp_dir().join(format!("sarspi-ref-{}.vcd", std::process::id()));
        let mut sim = Simulator::new(&config(LatchWindow::Reference), ConstantLevel(false)).unwrap();
        sim.open_vcd(&path).unwrap();
        sim.close_vcd().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(text.contains("$var wire 8 ( latched $end"));
    }

    #[test]
    fn test_frame_limit_saturates() {
        let sim = Simulator::new(&config(LatchWindow::Reference), ConstantLevel(false)).unwrap();
        assert_eq!(sim.frame_limit(0), 128);
        assert_eq!(sim.frame_limit(2), 3 * 128);
        assert_eq!(sim.frame_limit(usize::MAX), u64::MAX);
    }
}
