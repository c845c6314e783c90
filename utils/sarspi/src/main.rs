use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use sarspi::{
    AdcModel, Channel, ConstantLevel, EngineConfig, LatchWindow, SerialDevice, Simulator, Timing,
};

#[derive(Parser)]
#[command(name = "sarspi-sim")]
#[command(about = "Tick-level simulator of the SAR ADC serial protocol engine")]
#[command(version)]
struct Args {
    /// YAML engine configuration (defaults to the reference design)
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Channel requested from the converter
    #[arg(long, default_value = "0")]
    channel: u8,

    /// Converter inputs, one per channel (e.g. 0xCA1,0x123)
    #[arg(long, value_delimiter = ',', value_parser = parse_hex)]
    adc_values: Vec<u16>,

    /// Tie MISO to a fixed level instead of simulating the converter
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    constant_miso: Option<u8>,

    /// Latch window: "reference", "full" or MSB:LSB
    #[arg(long, value_parser = parse_latch)]
    latch: Option<LatchWindow>,

    /// Override the serial clock counter bit
    #[arg(long)]
    sclk_bit: Option<u8>,

    /// Override the number of idle counter bits
    #[arg(long)]
    idle_bits: Option<u8>,

    /// Override the serial clock delay
    #[arg(long)]
    clock_delay: Option<u8>,

    /// Override the data-out delay
    #[arg(long)]
    data_delay: Option<u8>,

    /// Number of frames to run
    #[arg(short, long, default_value = "4")]
    frames: usize,

    /// VCD output file
    #[arg(long)]
    vcd: Option<Utf8PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_hex(s: &str) -> Result<u16, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn parse_latch(s: &str) -> Result<LatchWindow, String> {
    match s {
        "reference" => Ok(LatchWindow::Reference),
        "full" => Ok(LatchWindow::Full),
        _ => {
            let (msb, lsb) = s
                .split_once(':')
                .ok_or_else(|| format!("expected reference, full or MSB:LSB, got {:?}", s))?;
            let msb = msb.trim().parse().map_err(|e| format!("bad msb: {}", e))?;
            let lsb = lsb.trim().parse().map_err(|e| format!("bad lsb: {}", e))?;
            Ok(LatchWindow::Bits { msb, lsb })
        }
    }
}

fn effective_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path))?,
        None => EngineConfig::default(),
    };

    if let Some(latch) = args.latch {
        config.latch = latch;
    }
    if let Some(bit) = args.sclk_bit {
        config.sclk_bit = bit;
    }
    if let Some(bits) = args.idle_bits {
        config.idle_bits = bits;
    }
    if let Some(delay) = args.clock_delay {
        config.clock_delay = delay;
    }
    if let Some(delay) = args.data_delay {
        config.data_delay = delay;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_budget(timing: &Timing) {
    let budget = timing.budget();
    println!(
        "tick {:.3} ns, sclk {:.3} MHz, {:.1} kS/s",
        budget.tick_ns,
        budget.sclk_hz / 1e6,
        budget.sample_rate_hz / 1e3
    );
    println!(
        "frame {} ticks, period {} ticks",
        timing.frame_ticks(),
        timing.period_ticks()
    );
    println!(
        "data out: setup {} ticks ({:.2} ns), hold {} ticks ({:.2} ns)",
        budget.setup_ticks,
        budget.setup_ns(),
        budget.hold_ticks,
        budget.hold_ns()
    );
}

fn run<D: SerialDevice>(config: &EngineConfig, device: D, args: &Args) -> Result<()> {
    let channel = Channel::try_from(args.channel)?;
    let mut sim = Simulator::new(config, device).context("Failed to create simulator")?;
    sim.set_channel(channel);

    print_budget(sim.engine().timing());

    if let Some(path) = &args.vcd {
        sim.open_vcd(path)
            .with_context(|| format!("Failed to open VCD file {}", path))?;
    }

    let records = sim.run_frames(args.frames)?;
    for record in &records {
        println!(
            "frame {:>4}  {}  miso {:#06x}  latched {:#06x}",
            record.index, record.channel, record.miso, record.latched
        );
    }

    sim.close_vcd()?;

    let dropped = sim.decoder().dropped();
    if dropped > 0 {
        log::warn!("{} incomplete frames on the bus", dropped);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = effective_config(&args)?;

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    match args.constant_miso {
        Some(level) => run(&config, ConstantLevel(level == 1), &args),
        None => {
            // A single value drives every channel.
            let adc = AdcModel::from_inputs(&args.adc_values).context("Invalid --adc-values")?;
            run(&config, adc, &args)
        }
    }
}
