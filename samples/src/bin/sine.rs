//! Plays a 440 Hz sine tone on the software backend.
//!
//! Reads single-letter commands from stdin: `p` pause, `u` unpause,
//! `P` pause from inside the callback, `c` clear buffer, `q` quit.

use std::io::BufRead as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use clap::Parser;

use audio_stream_core::{DeviceAim, StreamConfig, StreamDelegate, StreamError};
use samples::pcm::{pick_format, SINE_FORMATS};
use samples::tone::SineSource;

/// Play a sine tone through the Begin/End write protocol.
#[derive(Debug, Parser)]
#[command(name = "sine")]
struct Cli {
    /// Output device id. Defaults to the default output device.
    #[arg(long)]
    device: Option<String>,

    /// Select the raw (exclusive) variant of the device.
    #[arg(long)]
    raw: bool,

    /// Stream name.
    #[arg(long, default_value = "sine")]
    name: String,

    /// Requested software latency in seconds.
    #[arg(long)]
    latency: Option<f64>,

    /// Requested sample rate in Hz.
    #[arg(long)]
    rate: Option<u32>,
}

const FREQUENCY: f64 = 440.0;

struct UnderflowCounter {
    underflows: Arc<AtomicUsize>,
}

impl StreamDelegate for UnderflowCounter {
    fn on_underflow(&mut self) {
        self.underflows.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let (_backend, context) = samples::connect()?;
    let device = samples::select_device(&context, DeviceAim::Output, cli.device.as_deref(), cli.raw)?;
    println!("Output device: {}", device.name);

    let format = pick_format(&device, &SINE_FORMATS)
        .ok_or_else(|| anyhow!("{} supports none of the sine sample formats", device.name))?;

    let mut stream = context.outstream(&device)?;
    stream
        .configure(StreamConfig {
            format: Some(format),
            sample_rate: cli.rate,
            software_latency: cli.latency,
            name: cli.name,
            ..StreamConfig::default()
        })
        .context("invalid stream configuration")?;

    let source = SineSource::new(FREQUENCY, format);
    let callback_pause = source.pause_flag();
    let underflows = Arc::new(AtomicUsize::new(0));
    stream.set_write_handler(source);
    stream.set_delegate(UnderflowCounter {
        underflows: Arc::clone(&underflows),
    });

    stream.open().context("unable to open device")?;
    if let Some(err) = stream.layout_error() {
        eprintln!("unable to set channel layout: {}", err);
    }
    let params = stream
        .params()
        .ok_or_else(|| anyhow!("stream has no parameters after open"))?;
    println!("Software latency: {:.6}", params.software_latency);
    println!("Sample rate: {}", params.sample_rate);
    println!("Format: {}", params.format);
    println!("Layout: {}", params.layout);

    stream.start().context("unable to start device")?;
    println!(
        "'p\\n' - pause\n\
         'u\\n' - unpause\n\
         'P\\n' - pause from within callback\n\
         'c\\n' - clear buffer\n\
         'q\\n' - quit"
    );

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "p" => report(stream.pause(true), "pausing"),
            "P" => callback_pause.store(true, Ordering::Release),
            "u" => report(stream.pause(false), "unpausing"),
            "c" => report(stream.clear_buffer(), "clearing buffer"),
            "q" => break,
            "" => {}
            other => eprintln!("unrecognized command: {}", other),
        }
        let state = stream.state();
        if state.is_faulted() {
            bail!("stream faulted");
        }
        println!(
            "state: {:?}, underflows: {}",
            state,
            underflows.load(Ordering::Relaxed)
        );
    }

    stream.destroy();
    Ok(())
}

fn report(result: Result<(), StreamError>, action: &str) {
    if let Err(err) = result {
        eprintln!("error {}: {}", action, err);
    }
}
