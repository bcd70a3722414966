//! Shared pieces of the sample programs.
//!
//! ```text
//! samples
//! ├── device_info  ← serializable device snapshot, text rendering
//! ├── pcm          ← f64 → any SampleFormat encoders, format/rate priorities
//! ├── tone         ← realtime sine writer (sine)
//! ├── recording    ← realtime capture sink, metadata sidecar (record)
//! └── bin/         ← list-devices, sine, record
//! ```

use std::sync::Arc;

use anyhow::{anyhow, Context as _};

use audio_stream_core::{Backend, Context, Device, DeviceAim};
use audio_stream_dummy::{DummyBackend, DummyBackendConfig};

pub mod device_info;
pub mod pcm;
pub mod recording;
pub mod tone;

/// Connects to the software backend and takes the first device snapshot.
pub fn connect() -> anyhow::Result<(Arc<DummyBackend>, Context)> {
    let backend = DummyBackend::new(DummyBackendConfig::default()).context("failed to start backend")?;
    let dyn_backend: Arc<dyn Backend> = backend.clone();
    let mut context = Context::connect(dyn_backend).context("failed to connect")?;
    context.flush_events().context("failed to scan devices")?;
    Ok((backend, context))
}

/// The device named by `id`, or the default device of that direction.
pub fn select_device(context: &Context, aim: DeviceAim, id: Option<&str>, raw: bool) -> anyhow::Result<Device> {
    let device = match (id, aim) {
        (Some(id), _) => context
            .find_device(aim, id, raw)
            .ok_or_else(|| anyhow!("no {} device with id {}{}", aim, id, if raw { " (raw)" } else { "" }))?,
        (None, DeviceAim::Output) => context
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"))?,
        (None, DeviceAim::Input) => context
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device"))?,
    };
    if let Some(err) = device.probe_error() {
        return Err(anyhow!("unable to probe device {}: {}", device.id, err));
    }
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_default_and_named_devices() {
        let (_backend, context) = connect().unwrap();
        let output = select_device(&context, DeviceAim::Output, None, false).unwrap();
        assert_eq!(output.id, "dummy-out");
        let input = select_device(&context, DeviceAim::Input, Some("dummy-in"), false).unwrap();
        assert_eq!(input.aim, DeviceAim::Input);
        assert!(select_device(&context, DeviceAim::Input, Some("dummy-in"), true).is_err());
        assert!(select_device(&context, DeviceAim::Output, Some("missing"), false).is_err());
    }
}
