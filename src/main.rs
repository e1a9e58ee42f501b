mod config;
mod state;
mod websocket;

use clap::Parser;
use log::{debug, error, info};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use config::Config;
use mic_level::device::BusSelector;
use mic_level::mock::{SimulatedBus, SimulatedEnumerator};
use mic_level::{
    BusChannel, Channel, Mcp3008, SampleRequest, SampleWindow, Sampler, SamplerWorker,
};
use state::LevelReport;
use websocket::websocket_thread;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sample a simulated microphone instead of the SPI bus
    #[arg(long)]
    mock: bool,

    /// Bus descriptor, e.g. "spi0" or "bus 0"
    #[arg(long)]
    descriptor: Option<String>,

    /// ADC channel the microphone is wired to (0-7)
    #[arg(long)]
    channel: Option<u8>,

    #[arg(long)]
    window_ms: Option<u32>,

    #[arg(long)]
    interval_ms: Option<u64>,

    #[arg(long)]
    scale_max: Option<i32>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(descriptor) = &self.descriptor {
            config.descriptor = descriptor.clone();
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(window_ms) = self.window_ms {
            config.window_ms = window_ms;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(scale_max) = self.scale_max {
            config.scale_max = scale_max;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!("Starting microphone level monitor");
    debug!("Config: {:?}", config);

    if args.mock {
        let bus = BusSelector::parse(&config.descriptor)?.bus;
        let enumerator =
            SimulatedEnumerator::new(SimulatedBus::new(config.channel)).with_device(bus, 0);
        run(Mcp3008::connect_with(&enumerator, &config.descriptor)?, &config)
    } else {
        run(Mcp3008::connect(&config.descriptor)?, &config)
    }
}

fn run<B: BusChannel + 'static>(adc: Mcp3008<B>, config: &Config) -> Result<(), Box<dyn Error>> {
    let request = SampleRequest {
        channel: Channel::new(config.channel)?,
        window: SampleWindow::new(config.window_ms, config.scale_max)?,
    };

    let latest: Arc<Mutex<Option<LevelReport>>> = Arc::new(Mutex::new(None));
    let latest_clone = Arc::clone(&latest);
    let addr = config.websocket_addr.clone();
    thread::spawn(move || {
        websocket_thread(addr, latest_clone);
    });

    let worker = SamplerWorker::spawn(Sampler::new(adc))?;
    let interval = Duration::from_millis(config.interval_ms);
    let mut last_level = None;
    let mut sequence = 0u64;

    loop {
        let started = Instant::now();
        let level = worker
            .sample(request)
            .inspect_err(|e| error!("Sampling {} failed: {}", request.channel, e))?;

        if last_level != Some(level) {
            info!("[LEVEL] {} {}/{}", request.channel, level, request.window.scale_max);
            last_level = Some(level);
        }

        state::publish(&latest, LevelReport::new(sequence, &request, level));
        sequence += 1;

        thread::sleep(interval.saturating_sub(started.elapsed()));
    }
}
