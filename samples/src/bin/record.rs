//! Records from the software backend's input to a raw PCM file.
//!
//! Writes interleaved samples in the negotiated format and a
//! `OUTFILE.metadata.json` sidecar describing them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context as _};
use chrono::Utc;
use clap::Parser;
use uuid::Uuid;

use audio_stream_core::{DeviceAim, ReadContext, RingConsumer, StreamConfig};
use samples::pcm::{pick_format_or_first, pick_sample_rate, RECORD_FORMATS, RECORD_RATES};
use samples::recording::{write_metadata, CaptureSink, RecordingMetadata};

/// Record from an input device to a raw PCM file.
#[derive(Debug, Parser)]
#[command(name = "record")]
struct Cli {
    /// Input device id. Defaults to the default input device.
    #[arg(long)]
    device: Option<String>,

    /// Select the raw (exclusive) variant of the device.
    #[arg(long)]
    raw: bool,

    /// Recording length in seconds.
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Raw PCM output file.
    outfile: PathBuf,
}

const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Moves everything readable from `consumer` into `out`. Returns bytes written.
fn drain(consumer: &mut RingConsumer, out: &mut impl Write) -> anyhow::Result<u64> {
    let mut written = 0u64;
    loop {
        let chunk = consumer.read_slice();
        if chunk.is_empty() {
            return Ok(written);
        }
        out.write_all(chunk).context("failed to write recording")?;
        let len = chunk.len();
        consumer.advance_read(len);
        written += len as u64;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Cli {
        device,
        raw,
        seconds,
        outfile,
    } = Cli::parse();

    let (_backend, mut context) = samples::connect()?;
    let device = samples::select_device(&context, DeviceAim::Input, device.as_deref(), raw)?;
    println!("Input device: {}", device.name);

    let format = pick_format_or_first(&device, &RECORD_FORMATS)
        .ok_or_else(|| anyhow!("{} advertises no sample formats", device.name))?;
    let sample_rate = pick_sample_rate(&device, &RECORD_RATES)
        .ok_or_else(|| anyhow!("{} advertises no sample rates", device.name))?;

    let mut stream = context.instream(&device)?;
    stream
        .configure(StreamConfig {
            format: Some(format),
            sample_rate: Some(sample_rate),
            name: "record".to_string(),
            ..StreamConfig::default()
        })
        .context("invalid stream configuration")?;
    // Opening needs a callback; the ring is sized from the negotiated
    // parameters, so the real sink replaces this one before start.
    stream.set_read_callback(|_: &mut ReadContext<'_>, _: usize, _: usize| {});
    stream.open().context("unable to open input device")?;
    if let Some(err) = stream.layout_error() {
        eprintln!("unable to set channel layout: {}", err);
    }
    let params = stream
        .params()
        .ok_or_else(|| anyhow!("stream has no parameters after open"))?
        .clone();
    println!(
        "{} {}Hz {} interleaved",
        params.layout, params.sample_rate, params.format
    );

    let (sink, mut consumer) = CaptureSink::new(&params)?;
    let dropped_frames = sink.dropped_frames();
    stream.set_read_handler(sink);

    let file = File::create(&outfile).with_context(|| format!("unable to open {}", outfile.display()))?;
    let mut out = BufWriter::new(file);
    let created_at = Utc::now();

    stream.start().context("unable to start input device")?;
    log::info!("recording {} seconds to {}", seconds, outfile.display());

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut bytes = 0u64;
    while Instant::now() < deadline {
        thread::sleep(DRAIN_INTERVAL);
        context.flush_events()?;
        if let Some(err) = context.disconnect_error() {
            bail!("backend disconnected: {}", err);
        }
        if stream.state().is_faulted() {
            bail!("input stream faulted");
        }
        bytes += drain(&mut consumer, &mut out)?;
    }

    let diagnostics = stream.diagnostics();
    stream.destroy();
    bytes += drain(&mut consumer, &mut out)?;
    out.flush().context("failed to flush recording")?;

    let metadata = RecordingMetadata {
        id: Uuid::new_v4(),
        created_at,
        device_id: device.id.clone(),
        device_name: device.name.clone(),
        format: params.format,
        sample_rate: params.sample_rate,
        layout: params.layout,
        channel_count: params.channel_count(),
        frames: bytes / params.bytes_per_frame() as u64,
        dropped_frames: dropped_frames.load(Ordering::Relaxed),
        overflow_count: diagnostics.overflow_count,
    };
    let sidecar = write_metadata(&metadata, &outfile)?;
    println!(
        "wrote {:.2} seconds to {} ({})",
        metadata.duration_secs(),
        outfile.display(),
        sidecar.display()
    );
    if metadata.dropped_frames > 0 || metadata.overflow_count > 0 {
        eprintln!(
            "{} frames dropped, {} overflows",
            metadata.dropped_frames, metadata.overflow_count
        );
    }
    Ok(())
}
