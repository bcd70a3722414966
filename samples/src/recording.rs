//! Capture side of `record`: the realtime sink that moves captured frames
//! into a ring buffer, and the JSON sidecar written next to the raw PCM.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use audio_stream_core::{
    CapturedFrames, ChannelLayout, ReadCallback, ReadContext, RingBuffer, RingConsumer, RingProducer, SampleFormat,
    StreamError, StreamParams,
};

/// Seconds of audio the ring between the callback and the writer holds.
pub const RING_SECONDS: usize = 30;

/// Realtime read callback. Copies captured frames into a [`RingProducer`]
/// as interleaved PCM; holes become encoded silence. Frames that do not fit
/// are dropped and counted.
pub struct CaptureSink {
    producer: RingProducer,
    silence_frame: Vec<u8>,
    dropped_frames: Arc<AtomicU64>,
}

impl CaptureSink {
    /// Sizes a ring for [`RING_SECONDS`] of `params` and returns the sink
    /// with the consumer half.
    pub fn new(params: &StreamParams) -> Result<(Self, RingConsumer), StreamError> {
        let bytes_per_second = params
            .format
            .bytes_per_second(params.channel_count(), params.sample_rate);
        let (producer, consumer) = RingBuffer::new(RING_SECONDS * bytes_per_second)?.split();
        let mut silence_frame = vec![0u8; params.bytes_per_frame()];
        for sample in silence_frame.chunks_exact_mut(params.bytes_per_sample()) {
            params.format.write_silence(sample);
        }
        let sink = Self {
            producer,
            silence_frame,
            dropped_frames: Arc::new(AtomicU64::new(0)),
        };
        Ok((sink, consumer))
    }

    pub fn dropped_frames(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped_frames)
    }

    fn drain(&mut self, stream: &mut ReadContext<'_>, frame_count_max: usize) -> Result<(), StreamError> {
        let bytes_per_frame = self.silence_frame.len();
        let mut frames_left = frame_count_max;
        while frames_left > 0 {
            let frames = {
                let captured = stream.begin_read(frames_left)?;
                let frames = captured.frame_count();
                if frames == 0 {
                    drop(captured);
                    return stream.end_read();
                }
                let mut staged = self.producer.stage();
                if staged.remaining() < frames * bytes_per_frame {
                    self.dropped_frames.fetch_add(frames as u64, Ordering::Relaxed);
                } else {
                    match &captured {
                        CapturedFrames::Areas(areas) => {
                            for frame in 0..frames {
                                for channel in 0..areas.channel_count() {
                                    staged.write(areas.sample(channel, frame));
                                }
                            }
                        }
                        CapturedFrames::Hole(_) | CapturedFrames::Empty => {
                            for _ in 0..frames {
                                staged.write(&self.silence_frame);
                            }
                        }
                    }
                    staged.commit();
                }
                frames
            };
            stream.end_read()?;
            frames_left -= frames;
        }
        Ok(())
    }
}

impl ReadCallback for CaptureSink {
    fn on_read(&mut self, stream: &mut ReadContext<'_>, _frame_count_min: usize, frame_count_max: usize) {
        // Errors fault the stream and reach its delegate.
        let _ = self.drain(stream, frame_count_max);
    }
}

/// Sidecar describing a raw PCM recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub device_id: String,
    pub device_name: String,
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    pub channel_count: usize,
    pub frames: u64,
    pub dropped_frames: u64,
    pub overflow_count: u64,
}

impl RecordingMetadata {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / f64::from(self.sample_rate)
    }
}

/// `{recording}.metadata.json` next to the recording.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> anyhow::Result<PathBuf> {
    let path = metadata_path(recording_path);
    let json = serde_json::to_string_pretty(metadata).context("failed to serialize metadata")?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_metadata(recording_path: &Path) -> anyhow::Result<RecordingMetadata> {
    let path = metadata_path(recording_path);
    let json = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}
