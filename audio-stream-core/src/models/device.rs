use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::StreamError;
use super::format::SampleFormat;
use super::layout::ChannelLayout;

/// Direction of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAim {
    /// Capture (recording) device.
    Input,
    /// Render (playback) device.
    Output,
}

impl fmt::Display for DeviceAim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Inclusive range of supported sample rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRateRange {
    pub min: u32,
    pub max: u32,
}

impl SampleRateRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn single(rate: u32) -> Self {
        Self::new(rate, rate)
    }

    pub fn contains(&self, rate: u32) -> bool {
        (self.min..=self.max).contains(&rate)
    }

    fn clamp(&self, rate: u32) -> u32 {
        rate.clamp(self.min, self.max)
    }
}

/// Probed capabilities of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub layouts: Vec<ChannelLayout>,
    pub current_layout: Option<ChannelLayout>,
    pub formats: Vec<SampleFormat>,
    pub current_format: Option<SampleFormat>,
    pub sample_rates: Vec<SampleRateRange>,
    /// Zero when unknown.
    pub sample_rate_current: u32,
    /// Seconds. All three are zero when the backend cannot report them.
    pub software_latency_min: f64,
    pub software_latency_max: f64,
    pub software_latency_current: f64,
}

impl DeviceCapabilities {
    pub fn supports_format(&self, format: SampleFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn supports_layout(&self, layout: &ChannelLayout) -> bool {
        self.layouts.contains(layout)
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.sample_rates.iter().any(|range| range.contains(rate))
    }

    /// Supported rate nearest to `rate`. On an exact tie the higher rate wins.
    pub fn nearest_sample_rate(&self, rate: u32) -> Option<u32> {
        let mut best: Option<(u32, u32)> = None;
        for range in &self.sample_rates {
            let candidate = range.clamp(rate);
            if candidate == rate {
                return Some(rate);
            }
            let delta = candidate.abs_diff(rate);
            let better = match best {
                None => true,
                Some((best_rate, best_delta)) => {
                    delta < best_delta || (delta == best_delta && candidate > best_rate)
                }
            };
            if better {
                best = Some((candidate, delta));
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// Orders layouts from most to fewest channels.
    pub fn sort_channel_layouts(&mut self) {
        ChannelLayout::sort_by_channel_count(&mut self.layouts);
    }

    /// Clamps a latency request into the advertised range. Ranges of zero
    /// mean the device did not report one and the request passes through.
    pub fn clamp_software_latency(&self, seconds: f64) -> f64 {
        if self.software_latency_max <= 0.0 {
            return seconds;
        }
        seconds.clamp(self.software_latency_min, self.software_latency_max)
    }
}

/// Read-only description of a device, as produced by capability probing.
///
/// When probing failed only `id`, `name` and `aim` are meaningful; the
/// capabilities are replaced by the probe error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
    pub aim: DeviceAim,
    /// Exclusive hardware access rather than a shared/proxied endpoint.
    pub is_raw: bool,
    pub probe: Result<DeviceCapabilities, StreamError>,
}

impl DeviceDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        aim: DeviceAim,
        capabilities: DeviceCapabilities,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aim,
            is_raw: false,
            probe: Ok(capabilities),
        }
    }

    pub fn unprobed(
        id: impl Into<String>,
        name: impl Into<String>,
        aim: DeviceAim,
        probe_error: StreamError,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            aim,
            is_raw: false,
            probe: Err(probe_error),
        }
    }

    pub fn raw(mut self, is_raw: bool) -> Self {
        self.is_raw = is_raw;
        self
    }

    /// The probed capabilities, or the error that prevented probing.
    pub fn capabilities(&self) -> Result<&DeviceCapabilities, StreamError> {
        self.probe.as_ref().map_err(Clone::clone)
    }

    pub fn probe_error(&self) -> Option<&StreamError> {
        self.probe.as_ref().err()
    }

    pub fn supports_format(&self, format: SampleFormat) -> bool {
        self.capabilities()
            .is_ok_and(|caps| caps.supports_format(format))
    }

    pub fn supports_layout(&self, layout: &ChannelLayout) -> bool {
        self.capabilities()
            .is_ok_and(|caps| caps.supports_layout(layout))
    }

    pub fn supports_sample_rate(&self, rate: u32) -> bool {
        self.capabilities()
            .is_ok_and(|caps| caps.supports_sample_rate(rate))
    }

    pub fn nearest_sample_rate(&self, rate: u32) -> Option<u32> {
        self.capabilities().ok()?.nearest_sample_rate(rate)
    }

    pub fn sort_channel_layouts(&mut self) {
        if let Ok(caps) = self.probe.as_mut() {
            caps.sort_channel_layouts();
        }
    }
}

/// Shared handle to a [`DeviceDescriptor`].
///
/// Cloning takes a reference; dropping releases it. The descriptor is freed
/// with the last handle.
#[derive(Debug, Clone)]
pub struct Device(Arc<DeviceDescriptor>);

impl Device {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self(Arc::new(descriptor))
    }

    /// Number of live handles to this descriptor.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether both handles refer to the same probed descriptor.
    pub fn same_device(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Device {
    type Target = DeviceDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DeviceDescriptor> for Device {
    fn from(descriptor: DeviceDescriptor) -> Self {
        Self::new(descriptor)
    }
}

/// Equality compares id, aim and raw flag, matching how hosts identify a
/// device across rescans.
impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.aim == other.aim && self.is_raw == other.is_raw
    }
}

impl Eq for Device {}
