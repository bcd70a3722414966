use std::time::Duration;

use super::format::SampleFormat;
use super::layout::ChannelLayout;

/// Requested stream parameters.
///
/// Unset fields are negotiated against the device at open time.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Sample format. `None` prefers native-endian float 32, then the
    /// device's first advertised format.
    pub format: Option<SampleFormat>,

    /// Sample rate in Hz. `None` prefers 48000, then the nearest supported rate.
    pub sample_rate: Option<u32>,

    /// Channel layout. `None` uses the device's current layout.
    pub layout: Option<ChannelLayout>,

    /// Target software latency in seconds. `None` uses the device's current
    /// latency. Requests are clamped into the device's advertised range.
    pub software_latency: Option<f64>,

    /// Stream name shown by backends that expose one.
    pub name: String,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == Some(0) {
            return Err("sample rate must be positive".into());
        }
        if let Some(latency) = self.software_latency {
            if !latency.is_finite() || latency < 0.0 {
                return Err(format!("invalid software latency: {}", latency));
            }
        }
        if self.name.is_empty() {
            return Err("stream name must not be empty".into());
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            format: None,
            sample_rate: None,
            layout: None,
            software_latency: None,
            name: "audio-stream".into(),
        }
    }
}

/// Configuration for a [`crate::Context`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Application name reported to backends that group streams by client.
    pub app_name: String,

    /// Upper bound for one `wait_events` call. `None` waits until an event
    /// or a wakeup arrives.
    pub wait_timeout: Option<Duration>,
}

impl ContextConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.app_name.is_empty() {
            return Err("application name must not be empty".into());
        }
        if self.app_name.contains(':') {
            return Err("application name must not contain ':'".into());
        }
        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "AudioStream".into(),
            wait_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stream_config_is_valid() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rate() {
        let config = StreamConfig {
            sample_rate: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_latency() {
        let config = StreamConfig {
            software_latency: Some(-0.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn context_name_rules() {
        assert!(ContextConfig::default().validate().is_ok());
        let bad = ContextConfig {
            app_name: "a:b".into(),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
