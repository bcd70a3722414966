use std::fmt::Write as _;

use serde::Serialize;

use audio_stream_core::{Device, DeviceAim, DeviceCapabilities, DeviceList};

/// Serializable snapshot of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub aim: DeviceAim,
    pub is_raw: bool,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DeviceCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl DeviceInfo {
    pub fn new(device: &Device, is_default: bool) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            aim: device.aim,
            is_raw: device.is_raw,
            is_default,
            capabilities: device.capabilities().ok().cloned(),
            probe_error: device.probe_error().map(ToString::to_string),
        }
    }

    /// Inputs first, then outputs, each in backend order.
    pub fn from_list(list: &DeviceList) -> Vec<Self> {
        let inputs = list
            .inputs
            .iter()
            .enumerate()
            .map(|(index, device)| Self::new(device, list.default_input == Some(index)));
        let outputs = list
            .outputs
            .iter()
            .enumerate()
            .map(|(index, device)| Self::new(device, list.default_output == Some(index)));
        inputs.chain(outputs).collect()
    }

    /// Human-readable description. `short` prints the name line only.
    pub fn describe(&self, short: bool) -> String {
        let mut out = String::new();
        let default_marker = if self.is_default { " (default)" } else { "" };
        let raw_marker = if self.is_raw { " (raw)" } else { "" };
        let _ = writeln!(out, "{}{}{}", self.name, default_marker, raw_marker);
        if short {
            return out;
        }

        let _ = writeln!(out, "  id: {}", self.id);
        let _ = writeln!(out, "  aim: {}", self.aim);
        if let Some(err) = &self.probe_error {
            let _ = writeln!(out, "  probe error: {}", err);
            return out;
        }
        let Some(caps) = &self.capabilities else {
            return out;
        };

        let _ = writeln!(out, "  channel layouts:");
        for layout in &caps.layouts {
            let _ = writeln!(out, "    {}", layout);
        }
        if let Some(layout) = &caps.current_layout {
            let _ = writeln!(out, "  current layout: {}", layout);
        }

        let _ = writeln!(out, "  sample rates:");
        for range in &caps.sample_rates {
            if range.min == range.max {
                let _ = writeln!(out, "    {}", range.min);
            } else {
                let _ = writeln!(out, "    {} - {}", range.min, range.max);
            }
        }
        if caps.sample_rate_current != 0 {
            let _ = writeln!(out, "  current sample rate: {}", caps.sample_rate_current);
        }

        let formats: Vec<String> = caps.formats.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "  formats: {}", formats.join(", "));
        if let Some(format) = caps.current_format {
            let _ = writeln!(out, "  current format: {}", format);
        }

        if caps.software_latency_max > 0.0 {
            let _ = writeln!(out, "  min software latency: {:.8} sec", caps.software_latency_min);
            let _ = writeln!(out, "  max software latency: {:.8} sec", caps.software_latency_max);
        }
        if caps.software_latency_current > 0.0 {
            let _ = writeln!(out, "  current software latency: {:.8} sec", caps.software_latency_current);
        }
        out
    }
}
