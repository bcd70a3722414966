use std::sync::Arc;

use uuid::Uuid;

use crate::models::audio_models::{StreamDiagnostics, StreamParams};
use crate::models::config::StreamConfig;
use crate::models::device::{Device, DeviceAim};
use crate::models::error::StreamError;
use crate::models::state::StreamState;
use crate::traits::backend::{Backend, StreamDriver};
use crate::traits::stream_callbacks::{NoopDelegate, StreamDelegate, WriteCallback};

use super::driver::OutStreamDriver;
use super::handle::{blocked_by, StreamHandle};
use super::protocol::WriteContext;
use super::shared::StreamController;

/// Playback stream.
///
/// ```text
/// new → configure → set_write_callback → open → start → pause/resume → drop
/// ```
///
/// The write callback runs on the backend's realtime thread and moves data
/// with [`WriteContext::begin_write`]/[`WriteContext::end_write`]. Dropping
/// the stream stops that thread and releases the device.
pub struct OutStream {
    handle: StreamHandle,
    callback: Option<Box<dyn WriteCallback>>,
    delegate: Option<Box<dyn StreamDelegate>>,
    volume: f64,
}

impl OutStream {
    pub fn new(backend: Arc<dyn Backend>, device: Device) -> Self {
        Self {
            handle: StreamHandle::new(backend, device, DeviceAim::Output),
            callback: None,
            delegate: None,
            volume: 1.0,
        }
    }

    pub fn configure(&mut self, config: StreamConfig) -> Result<(), StreamError> {
        self.handle.configure(config)
    }

    /// Installs the realtime write callback. Replaces any previous one.
    pub fn set_write_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut WriteContext<'_>, usize, usize) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Like [`set_write_callback`](Self::set_write_callback) for a named type.
    pub fn set_write_handler(&mut self, handler: impl WriteCallback + 'static) {
        self.callback = Some(Box::new(handler));
    }

    pub fn set_delegate(&mut self, delegate: impl StreamDelegate + 'static) {
        self.delegate = Some(Box::new(delegate));
    }

    /// Negotiates parameters with the device and allocates backend buffers.
    ///
    /// Fails without touching the state when no write callback is installed.
    /// Any other failure leaves the stream `Faulted`.
    pub fn open(&mut self) -> Result<(), StreamError> {
        if self.callback.is_none() {
            return Err(StreamError::invalid("open requires a write callback"));
        }
        self.handle.open()
    }

    /// Starts the realtime callback. A refusal such as
    /// [`StreamError::DeviceBusy`] leaves the stream opened and ready to retry.
    pub fn start(&mut self) -> Result<(), StreamError> {
        let opened = self.handle.begin_start()?;
        let Some(callback) = self.callback.take() else {
            self.handle.abort_start(&StreamError::invalid("no write callback"));
            return Err(StreamError::invalid("start requires a write callback"));
        };
        let delegate = self
            .delegate
            .take()
            .unwrap_or_else(|| Box::new(NoopDelegate));
        let driver = OutStreamDriver::new(
            Arc::clone(self.handle.shared()),
            opened.params.clone(),
            opened.areas.clone(),
            callback,
            delegate,
        );
        match opened.control.start(StreamDriver::Output(driver)) {
            Ok(()) => {
                self.handle.started();
                Ok(())
            }
            Err(rejected) => {
                self.handle.abort_start(&rejected.error);
                if let Some(driver) = rejected.driver.into_output() {
                    let (callback, delegate) = driver.into_parts();
                    self.callback = Some(callback);
                    self.delegate = Some(delegate);
                }
                Err(rejected.error)
            }
        }
    }

    pub fn pause(&self, pause: bool) -> Result<(), StreamError> {
        self.handle.controller()?.pause(pause)
    }

    /// Drops audio queued in the backend but not yet played.
    pub fn clear_buffer(&self) -> Result<(), StreamError> {
        self.handle.controller()?.clear_buffer()
    }

    /// Sets the backend volume in `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f64) -> Result<(), StreamError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(StreamError::invalid(format!("volume {} outside 0..=1", volume)));
        }
        let opened = self
            .handle
            .opened()
            .ok_or_else(|| blocked_by(self.handle.state(), "set_volume requires an open stream"))?;
        opened.control.set_volume(volume)?;
        self.volume = volume;
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Cloneable pause/clear handle for other threads. Available once open.
    pub fn controller(&self) -> Result<StreamController, StreamError> {
        self.handle.controller()
    }

    pub fn state(&self) -> StreamState {
        self.handle.state()
    }

    pub fn id(&self) -> Uuid {
        self.handle.shared().id()
    }

    pub fn name(&self) -> &str {
        &self.handle.config().name
    }

    pub fn device(&self) -> &Device {
        self.handle.device()
    }

    /// Negotiated parameters. `None` until open.
    pub fn params(&self) -> Option<&StreamParams> {
        self.handle.opened().map(|opened| &opened.params)
    }

    /// Latency the backend configured, in seconds.
    pub fn software_latency(&self) -> Option<f64> {
        self.params().map(|params| params.software_latency)
    }

    /// Set when the requested layout was unavailable and the device default
    /// was used.
    pub fn layout_error(&self) -> Option<&StreamError> {
        self.handle.opened()?.layout_error.as_ref()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.handle.shared().diagnostics()
    }

    /// Stops the stream and releases the device. Same as dropping it.
    pub fn destroy(self) {}
}

impl std::fmt::Debug for OutStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutStream")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("device", &self.device().id)
            .field("state", &self.state())
            .finish()
    }
}
