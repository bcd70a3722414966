use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::SampleFormat;
use super::layout::ChannelLayout;

/// Audio subsystem a [`crate::Backend`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Jack,
    PulseAudio,
    Alsa,
    CoreAudio,
    Wasapi,
    Dummy,
}

impl BackendKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Jack => "JACK",
            Self::PulseAudio => "PulseAudio",
            Self::Alsa => "ALSA",
            Self::CoreAudio => "CoreAudio",
            Self::Wasapi => "WASAPI",
            Self::Dummy => "Dummy",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters a stream settled on at open time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamParams {
    pub name: String,
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    /// Seconds. Backends may replace the requested value with what they
    /// actually configured.
    pub software_latency: f64,
}

impl StreamParams {
    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_frame(self.channel_count())
    }

    pub fn seconds_per_frame(&self) -> f64 {
        1.0 / f64::from(self.sample_rate)
    }

    /// Whole frames covering `seconds` at the negotiated rate, at least one.
    pub fn frames_for(&self, seconds: f64) -> usize {
        ((seconds * f64::from(self.sample_rate)).ceil() as usize).max(1)
    }
}

/// Diagnostics for debugging a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDiagnostics {
    pub stream_id: Uuid,
    pub opened_at: Option<DateTime<Utc>>,
    pub callback_count: u64,
    pub frames_transferred: u64,
    pub underflow_count: u64,
    pub overflow_count: u64,
}
