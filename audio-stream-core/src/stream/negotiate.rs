use crate::models::audio_models::StreamParams;
use crate::models::config::StreamConfig;
use crate::models::device::{DeviceAim, DeviceCapabilities, DeviceDescriptor};
use crate::models::error::StreamError;
use crate::models::format::SampleFormat;
use crate::models::layout::ChannelLayout;

const PREFERRED_SAMPLE_RATE: u32 = 48000;

/// Outcome of matching a [`StreamConfig`] against a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiation {
    pub params: StreamParams,
    /// Set when the requested layout was unavailable and the device's
    /// default was used instead. The open still succeeds.
    pub layout_error: Option<StreamError>,
}

/// Resolves every unset field of `config` to a device default and checks
/// every set field against the device's capabilities.
pub fn negotiate(
    device: &DeviceDescriptor,
    aim: DeviceAim,
    config: &StreamConfig,
) -> Result<Negotiation, StreamError> {
    if device.aim != aim {
        return Err(StreamError::invalid(format!(
            "{} stream cannot use {} device {}",
            aim, device.aim, device.id
        )));
    }
    config.validate().map_err(StreamError::invalid)?;
    let caps = device.capabilities()?;

    let format = pick_format(caps, config.format)?;
    let sample_rate = pick_sample_rate(caps, config.sample_rate)?;
    let (layout, layout_error) = pick_layout(caps, config.layout)?;
    let software_latency = match config.software_latency {
        Some(requested) => caps.clamp_software_latency(requested),
        None => caps.software_latency_current,
    };

    Ok(Negotiation {
        params: StreamParams {
            name: config.name.clone(),
            format,
            sample_rate,
            layout,
            software_latency,
        },
        layout_error,
    })
}

fn pick_format(caps: &DeviceCapabilities, requested: Option<SampleFormat>) -> Result<SampleFormat, StreamError> {
    match requested {
        Some(format) if caps.supports_format(format) => Ok(format),
        Some(format) => Err(StreamError::IncompatibleDevice(format!(
            "sample format {} not supported",
            format
        ))),
        None if caps.supports_format(SampleFormat::FLOAT32_NE) => Ok(SampleFormat::FLOAT32_NE),
        None => caps
            .formats
            .first()
            .copied()
            .ok_or_else(|| StreamError::IncompatibleDevice("device advertises no sample formats".into())),
    }
}

fn pick_sample_rate(caps: &DeviceCapabilities, requested: Option<u32>) -> Result<u32, StreamError> {
    match requested {
        Some(rate) if caps.supports_sample_rate(rate) => Ok(rate),
        Some(rate) => Err(StreamError::IncompatibleDevice(format!(
            "sample rate {} not supported",
            rate
        ))),
        None => caps
            .nearest_sample_rate(PREFERRED_SAMPLE_RATE)
            .ok_or_else(|| StreamError::IncompatibleDevice("device advertises no sample rates".into())),
    }
}

fn pick_layout(
    caps: &DeviceCapabilities,
    requested: Option<ChannelLayout>,
) -> Result<(ChannelLayout, Option<StreamError>), StreamError> {
    let fallback = caps.current_layout.or_else(|| caps.layouts.first().copied());
    match requested {
        Some(layout) if caps.supports_layout(&layout) => Ok((layout, None)),
        Some(layout) => {
            let fallback = fallback.ok_or_else(|| {
                StreamError::IncompatibleDevice("device advertises no channel layouts".into())
            })?;
            let error = StreamError::IncompatibleDevice(format!("channel layout {} not supported", layout));
            Ok((fallback, Some(error)))
        }
        None => fallback
            .map(|layout| (layout, None))
            .ok_or_else(|| StreamError::IncompatibleDevice("device advertises no channel layouts".into())),
    }
}
