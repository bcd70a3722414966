use std::time::Duration;

use audio_stream_core::{
    ChannelLayout, DeviceAim, DeviceCapabilities, DeviceDescriptor, SampleFormat, SampleRateRange,
};

/// Configuration for a [`crate::DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct DummyBackendConfig {
    /// Devices advertised at connect time. The first device of each
    /// direction is the default.
    pub devices: Vec<DeviceDescriptor>,

    /// How often each stream thread wakes to advance its simulated buffer.
    pub period: Duration,
}

impl DummyBackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.period.is_zero() {
            return Err("period must be positive".into());
        }
        for (index, device) in self.devices.iter().enumerate() {
            if device.id.is_empty() {
                return Err(format!("device {} has an empty id", index));
            }
            let duplicate = self.devices[..index]
                .iter()
                .any(|other| other.id == device.id && other.aim == device.aim && other.is_raw == device.is_raw);
            if duplicate {
                return Err(format!("duplicate {} device id: {}", device.aim, device.id));
            }
        }
        Ok(())
    }
}

impl Default for DummyBackendConfig {
    fn default() -> Self {
        Self {
            devices: vec![
                DeviceDescriptor::new("dummy-out", "Dummy Output", DeviceAim::Output, dummy_capabilities()),
                DeviceDescriptor::new("dummy-in", "Dummy Input", DeviceAim::Input, dummy_capabilities()),
            ],
            period: Duration::from_millis(10),
        }
    }
}

/// Capabilities of the default dummy devices: every sample format, a stereo
/// current layout, and any rate from 8 kHz to 384 kHz.
pub fn dummy_capabilities() -> DeviceCapabilities {
    let mut layouts: Vec<ChannelLayout> = ChannelLayout::builtins().collect();
    ChannelLayout::sort_by_channel_count(&mut layouts);
    DeviceCapabilities {
        layouts,
        current_layout: Some(ChannelLayout::stereo()),
        formats: SampleFormat::ALL.to_vec(),
        current_format: Some(SampleFormat::FLOAT32_NE),
        sample_rates: vec![SampleRateRange::new(8000, 384_000)],
        sample_rate_current: 48000,
        software_latency_min: 0.01,
        software_latency_max: 4.0,
        software_latency_current: 0.1,
    }
}
