use std::sync::Arc;

use uuid::Uuid;

use crate::models::audio_models::{StreamDiagnostics, StreamParams};
use crate::models::config::StreamConfig;
use crate::models::device::{Device, DeviceAim};
use crate::models::error::StreamError;
use crate::models::state::StreamState;
use crate::traits::backend::{Backend, StreamDriver};
use crate::traits::stream_callbacks::{NoopDelegate, ReadCallback, StreamDelegate};

use super::driver::InStreamDriver;
use super::handle::StreamHandle;
use super::protocol::ReadContext;
use super::shared::StreamController;

/// Capture stream. Same lifecycle as [`OutStream`](super::OutStream), with
/// a read callback and overflow instead of underflow notifications.
pub struct InStream {
    handle: StreamHandle,
    callback: Option<Box<dyn ReadCallback>>,
    delegate: Option<Box<dyn StreamDelegate>>,
}

impl InStream {
    pub fn new(backend: Arc<dyn Backend>, device: Device) -> Self {
        Self {
            handle: StreamHandle::new(backend, device, DeviceAim::Input),
            callback: None,
            delegate: None,
        }
    }

    pub fn configure(&mut self, config: StreamConfig) -> Result<(), StreamError> {
        self.handle.configure(config)
    }

    pub fn set_read_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ReadContext<'_>, usize, usize) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn set_read_handler(&mut self, handler: impl ReadCallback + 'static) {
        self.callback = Some(Box::new(handler));
    }

    pub fn set_delegate(&mut self, delegate: impl StreamDelegate + 'static) {
        self.delegate = Some(Box::new(delegate));
    }

    pub fn open(&mut self) -> Result<(), StreamError> {
        if self.callback.is_none() {
            return Err(StreamError::invalid("open requires a read callback"));
        }
        self.handle.open()
    }

    pub fn start(&mut self) -> Result<(), StreamError> {
        let opened = self.handle.begin_start()?;
        let Some(callback) = self.callback.take() else {
            self.handle.abort_start(&StreamError::invalid("no read callback"));
            return Err(StreamError::invalid("start requires a read callback"));
        };
        let delegate = self
            .delegate
            .take()
            .unwrap_or_else(|| Box::new(NoopDelegate));
        let driver = InStreamDriver::new(
            Arc::clone(self.handle.shared()),
            opened.params.clone(),
            opened.areas.clone(),
            callback,
            delegate,
        );
        match opened.control.start(StreamDriver::Input(driver)) {
            Ok(()) => {
                self.handle.started();
                Ok(())
            }
            Err(rejected) => {
                self.handle.abort_start(&rejected.error);
                if let Some(driver) = rejected.driver.into_input() {
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

    pub fn params(&self) -> Option<&StreamParams> {
        self.handle.opened().map(|opened| &opened.params)
    }

    pub fn software_latency(&self) -> Option<f64> {
        self.params().map(|params| params.software_latency)
    }

    pub fn layout_error(&self) -> Option<&StreamError> {
        self.handle.opened()?.layout_error.as_ref()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.handle.shared().diagnostics()
    }

    pub fn destroy(self) {}
}

impl std::fmt::Debug for InStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InStream")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("device", &self.device().id)
            .field("state", &self.state())
            .finish()
    }
}
