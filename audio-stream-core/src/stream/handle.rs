use std::sync::Arc;

use crate::models::audio_models::StreamParams;
use crate::models::config::StreamConfig;
use crate::models::device::{Device, DeviceAim};
use crate::models::error::StreamError;
use crate::models::state::StreamState;
use crate::processing::channel_areas::AreaLayout;
use crate::traits::backend::{Backend, OpenedStream, StreamControl};

use super::negotiate::negotiate;
use super::shared::{StreamController, StreamShared};

/// Resources a stream holds between open and destruction.
pub(crate) struct OpenedResources {
    pub params: StreamParams,
    pub layout_error: Option<StreamError>,
    pub areas: AreaLayout,
    pub control: Arc<dyn StreamControl>,
}

/// Lifecycle shared by [`OutStream`](super::OutStream) and
/// [`InStream`](super::InStream).
///
/// Holds one [`Device`] reference from construction until drop.
pub(crate) struct StreamHandle {
    aim: DeviceAim,
    device: Device,
    backend: Arc<dyn Backend>,
    config: StreamConfig,
    shared: Arc<StreamShared>,
    opened: Option<OpenedResources>,
}

impl StreamHandle {
    pub fn new(backend: Arc<dyn Backend>, device: Device, aim: DeviceAim) -> Self {
        Self {
            aim,
            device,
            backend,
            config: StreamConfig::default(),
            shared: Arc::new(StreamShared::new()),
            opened: None,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn shared(&self) -> &Arc<StreamShared> {
        &self.shared
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    pub fn opened(&self) -> Option<&OpenedResources> {
        self.opened.as_ref()
    }

    /// Created/Configured → Configured.
    pub fn configure(&mut self, config: StreamConfig) -> Result<(), StreamError> {
        let state = self.state();
        if !state.can_transition_to(StreamState::Configured) {
            return Err(blocked_by(state, "configure is only valid before open"));
        }
        config.validate().map_err(StreamError::invalid)?;
        self.config = config;
        self.shared
            .state
            .transition(StreamState::Configured)
            .map_err(|state| blocked_by(state, "configure is only valid before open"))?;
        Ok(())
    }

    /// Configured → Opened, or Faulted when negotiation or the backend fails.
    /// A stream still in `Created` is configured with defaults first.
    pub fn open(&mut self) -> Result<(), StreamError> {
        if self.state() == StreamState::Created {
            self.configure(self.config.clone())?;
        }
        let state = self.state();
        if state != StreamState::Configured {
            return Err(blocked_by(state, "stream is already open"));
        }
        match self.open_resources() {
            Ok(resources) => {
                self.opened = Some(resources);
                Ok(())
            }
            Err(err) => {
                self.shared.fault();
                log::error!(
                    "Failed to open {} stream '{}' on {}: {}",
                    self.aim,
                    self.config.name,
                    self.device.id,
                    err
                );
                Err(err)
            }
        }
    }

    fn open_resources(&self) -> Result<OpenedResources, StreamError> {
        let negotiation = negotiate(&self.device, self.aim, &self.config)?;
        let params = negotiation.params;
        log::debug!(
            "negotiated {} / {} Hz / {} / {:.4}s for '{}'",
            params.format,
            params.sample_rate,
            params.layout,
            params.software_latency,
            params.name
        );
        if let Some(err) = &negotiation.layout_error {
            log::warn!("{}; using {}", err, params.layout);
        }

        let OpenedStream {
            control,
            areas,
            software_latency,
        } = match self.aim {
            DeviceAim::Output => self.backend.open_outstream(&self.device, &params)?,
            DeviceAim::Input => self.backend.open_instream(&self.device, &params)?,
        };
        if let Err(err) = areas.validate(params.channel_count(), params.bytes_per_sample()) {
            control.stop();
            return Err(err);
        }

        self.shared
            .state
            .transition(StreamState::Opened)
            .map_err(|state| blocked_by(state, "stream changed state while opening"))?;
        self.shared.mark_opened();
        log::info!(
            "opened {} stream {} on {} ({})",
            self.aim,
            self.shared.id(),
            self.device.name,
            self.backend.kind()
        );

        Ok(OpenedResources {
            params: StreamParams {
                software_latency,
                ..params
            },
            layout_error: negotiation.layout_error,
            areas,
            control,
        })
    }

    /// Opened → Started ahead of handing the driver to the backend.
    pub fn begin_start(&self) -> Result<&OpenedResources, StreamError> {
        let state = self.state();
        let opened = match (&self.opened, state) {
            (Some(opened), StreamState::Opened) => opened,
            _ => return Err(blocked_by(state, "start requires an opened stream")),
        };
        if !self
            .shared
            .state
            .transition_from(StreamState::Opened, StreamState::Started)
        {
            return Err(blocked_by(self.state(), "start requires an opened stream"));
        }
        Ok(opened)
    }

    /// The backend refused to start; the stream stays opened.
    pub fn abort_start(&self, err: &StreamError) {
        self.shared.state.abort_start();
        log::warn!("start of stream {} rejected: {}", self.shared.id(), err);
    }

    pub fn started(&self) {
        log::info!("started stream {}", self.shared.id());
    }

    pub fn controller(&self) -> Result<StreamController, StreamError> {
        let opened = self
            .opened
            .as_ref()
            .ok_or_else(|| blocked_by(self.state(), "stream is not open"))?;
        Ok(StreamController::new(
            Arc::clone(&self.shared),
            Arc::clone(&opened.control),
        ))
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        let _ = self.shared.state.transition(StreamState::Destroyed);
        if let Some(opened) = &self.opened {
            opened.control.stop();
        }
        log::info!("destroyed stream {}", self.shared.id());
    }
}

/// Error for an operation the current state does not allow.
pub(crate) fn blocked_by(state: StreamState, what: &'static str) -> StreamError {
    if state.is_faulted() {
        StreamError::Streaming
    } else {
        StreamError::invalid(what)
    }
}
