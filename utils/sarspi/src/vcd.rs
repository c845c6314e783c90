//! Value-change-dump output for waveform viewers.

use std::io::{self, Write};

use crate::engine::{EngineState, Lines};

/// Handle of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarId(usize);

#[derive(Debug)]
struct Var {
    name: String,
    code: String,
    width: u8,
    last: Option<u64>,
}

/// Minimal VCD writer: one flat scope, wires only, picosecond timescale.
#[derive(Debug)]
pub struct VcdWriter<W: Write> {
    out: W,
    scope: String,
    vars: Vec<Var>,
    tick_ps: u64,
    last_time: Option<u64>,
    header_written: bool,
}

fn identifier_code(mut index: usize) -> String {
    const FIRST: u8 = b'!';
    const SPAN: usize = (b'~' - b'!' + 1) as usize;
    let mut code = String::new();
    loop {
        code.push((FIRST + (index % SPAN) as u8) as char);
        index /= SPAN;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    code
}

impl<W: Write> VcdWriter<W> {
    pub fn new(out: W, scope: &str, tick_rate_hz: u32) -> Self {
        let tick_ps = (1e12 / tick_rate_hz.max(1) as f64).round() as u64;
        Self {
            out,
            scope: scope.to_string(),
            vars: Vec::new(),
            tick_ps: tick_ps.max(1),
            last_time: None,
            header_written: false,
        }
    }

    /// Declare a wire. Declarations after the first value change are ignored
    /// by viewers, so this must happen before [`VcdWriter::change`].
    pub fn add_var(&mut self, name: &str, width: u8) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(Var {
            name: name.to_string(),
            code: identifier_code(id.0),
            width: width.max(1),
            last: None,
        });
        id
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "$version sarspi {} $end", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "$timescale 1ps $end")?;
        writeln!(self.out, "$scope module {} $end", self.scope)?;
        for var in &self.vars {
            writeln!(
                self.out,
                "$var wire {} {} {} $end",
                var.width, var.code, var.name
            )?;
        }
        writeln!(self.out, "$upscope $end")?;
        writeln!(self.out, "$enddefinitions $end")?;
        self.header_written = true;
        Ok(())
    }

    /// Record `value` for `var` at `tick`. Unchanged values are skipped.
    pub fn change(&mut self, tick: u64, var: VarId, value: u64) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
        }
        let entry = &self.vars[var.0];
        if entry.last == Some(value) {
            return Ok(());
        }

        let time = tick * self.tick_ps;
        if self.last_time != Some(time) {
            writeln!(self.out, "#{}", time)?;
            self.last_time = Some(time);
        }

        let entry = &mut self.vars[var.0];
        if entry.width == 1 {
            writeln!(self.out, "{}{}", value & 1, entry.code)?;
        } else {
            writeln!(
                self.out,
                "b{:0width$b} {}",
                value,
                entry.code,
                width = entry.width as usize
            )?;
        }
        entry.last = Some(value);
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        if !self.header_written {
            self.write_header()?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// The standard set of traced signals of a simulated bus.
#[derive(Debug)]
pub struct BusTrace<W: Write> {
    vcd: VcdWriter<W>,
    counter: VarId,
    chip_select_n: VarId,
    sclk: VarId,
    mosi: VarId,
    miso: VarId,
    channel: VarId,
    shift: VarId,
    latched: VarId,
}

impl<W: Write> BusTrace<W> {
    /// `latched_bits` is the width of the latch window, not of the sample.
    pub fn new(
        out: W,
        tick_rate_hz: u32,
        counter_bits: u8,
        resolution: u8,
        latched_bits: u8,
    ) -> Self {
        let mut vcd = VcdWriter::new(out, "sarspi", tick_rate_hz);
        Self {
            counter: vcd.add_var("frame_counter", counter_bits),
            chip_select_n: vcd.add_var("cs_n", 1),
            sclk: vcd.add_var("sclk", 1),
            mosi: vcd.add_var("mosi", 1),
            miso: vcd.add_var("miso", 1),
            channel: vcd.add_var("channel", 3),
            shift: vcd.add_var("shift", resolution),
            latched: vcd.add_var("latched", latched_bits),
            vcd,
        }
    }

    pub fn dump(&mut self, tick: u64, state: &EngineState, lines: Lines, miso: bool) -> io::Result<()> {
        self.vcd.change(tick, self.counter, state.counter as u64)?;
        self.vcd.change(tick, self.chip_select_n, lines.chip_select_n as u64)?;
        self.vcd.change(tick, self.sclk, lines.sclk as u64)?;
        self.vcd.change(tick, self.mosi, lines.mosi as u64)?;
        self.vcd.change(tick, self.miso, miso as u64)?;
        self.vcd.change(tick, self.channel, state.channel.index() as u64)?;
        self.vcd.change(tick, self.shift, state.shift as u64)?;
        self.vcd.change(tick, self.latched, state.latched as u64)
    }

    pub fn finish(self) -> io::Result<W> {
        self.vcd.finish()
    }
}
