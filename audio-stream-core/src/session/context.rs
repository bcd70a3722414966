use std::sync::Arc;

use crate::models::audio_models::BackendKind;
use crate::models::config::ContextConfig;
use crate::models::device::{Device, DeviceAim};
use crate::models::error::StreamError;
use crate::stream::{InStream, OutStream};
use crate::traits::backend::{Backend, BackendEvent, DeviceList};
use crate::traits::context_delegate::ContextDelegate;

/// Connection to one backend plus the event pump that keeps its device list
/// current.
///
/// The host calls [`flush_events`](Self::flush_events) or
/// [`wait_events`](Self::wait_events) from a non-realtime thread; device
/// queries answer from the snapshot taken by the last pump that rescanned.
/// Before the first pump the snapshot is empty.
pub struct Context {
    backend: Arc<dyn Backend>,
    config: ContextConfig,
    devices: Option<DeviceList>,
    rescan_pending: bool,
    disconnected: Option<StreamError>,
    delegate: Option<Box<dyn ContextDelegate>>,
}

impl Context {
    pub fn connect(backend: Arc<dyn Backend>) -> Result<Self, StreamError> {
        Self::with_config(backend, ContextConfig::default())
    }

    pub fn with_config(backend: Arc<dyn Backend>, config: ContextConfig) -> Result<Self, StreamError> {
        config.validate().map_err(StreamError::invalid)?;
        log::info!("{} connected to {} backend", config.app_name, backend.kind());
        Ok(Self {
            backend,
            config,
            devices: None,
            rescan_pending: true,
            disconnected: None,
            delegate: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: impl ContextDelegate + 'static) {
        self.delegate = Some(Box::new(delegate));
    }

    pub fn current_backend(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    /// The error that disconnected the backend, if any.
    pub fn disconnect_error(&self) -> Option<&StreamError> {
        self.disconnected.as_ref()
    }

    /// Delivers queued backend events without blocking and rescans devices
    /// when they changed. The first call always scans.
    pub fn flush_events(&mut self) -> Result<(), StreamError> {
        for event in self.backend.take_events() {
            match event {
                BackendEvent::DevicesChanged => self.rescan_pending = true,
                BackendEvent::Disconnected(err) => {
                    if self.disconnected.is_none() {
                        log::error!("{} backend disconnected: {}", self.backend.kind(), err);
                        if let Some(delegate) = self.delegate.as_mut() {
                            delegate.on_backend_disconnect(&err);
                        }
                        self.disconnected = Some(err);
                    }
                }
            }
        }
        if self.disconnected.is_some() || !self.rescan_pending {
            return Ok(());
        }

        let devices = self.backend.enumerate_devices()?;
        self.rescan_pending = false;
        log::debug!(
            "device scan: {} inputs, {} outputs",
            devices.inputs.len(),
            devices.outputs.len()
        );
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.on_devices_change(&devices);
        }
        self.devices = Some(devices);
        Ok(())
    }

    /// Flushes, then blocks until the backend queues an event, a [`Waker`]
    /// fires or the configured timeout passes. Events that arrive while
    /// blocked are delivered by the next flush.
    pub fn wait_events(&mut self) -> Result<(), StreamError> {
        self.flush_events()?;
        self.backend.wait_events(self.config.wait_timeout);
        Ok(())
    }

    /// Handle that interrupts [`wait_events`](Self::wait_events) from another thread.
    pub fn waker(&self) -> Waker {
        Waker {
            backend: Arc::clone(&self.backend),
        }
    }

    /// Forces a full rescan on the next flush, even without a change event.
    pub fn force_device_rescan(&mut self) {
        self.rescan_pending = true;
        self.backend.force_device_rescan();
    }

    pub fn devices(&self) -> Option<&DeviceList> {
        self.devices.as_ref()
    }

    pub fn input_device_count(&self) -> usize {
        self.devices.as_ref().map_or(0, |list| list.inputs.len())
    }

    pub fn output_device_count(&self) -> usize {
        self.devices.as_ref().map_or(0, |list| list.outputs.len())
    }

    /// Takes a new reference to the `index`-th input device.
    pub fn input_device(&self, index: usize) -> Option<Device> {
        self.devices.as_ref()?.inputs.get(index).cloned()
    }

    pub fn output_device(&self, index: usize) -> Option<Device> {
        self.devices.as_ref()?.outputs.get(index).cloned()
    }

    pub fn default_input_device_index(&self) -> Option<usize> {
        self.devices.as_ref()?.default_input
    }

    pub fn default_output_device_index(&self) -> Option<usize> {
        self.devices.as_ref()?.default_output
    }

    pub fn default_input_device(&self) -> Option<Device> {
        self.input_device(self.default_input_device_index()?)
    }

    pub fn default_output_device(&self) -> Option<Device> {
        self.output_device(self.default_output_device_index()?)
    }

    /// Looks a device up by id, direction and raw flag.
    pub fn find_device(&self, aim: DeviceAim, id: &str, is_raw: bool) -> Option<Device> {
        let list = self.devices.as_ref()?;
        let devices = match aim {
            DeviceAim::Input => &list.inputs,
            DeviceAim::Output => &list.outputs,
        };
        devices
            .iter()
            .find(|device| device.id == id && device.is_raw == is_raw)
            .cloned()
    }

    /// Creates a playback stream bound to `device`.
    pub fn outstream(&self, device: &Device) -> Result<OutStream, StreamError> {
        self.check_stream_target(device, DeviceAim::Output)?;
        Ok(OutStream::new(Arc::clone(&self.backend), device.clone()))
    }

    /// Creates a capture stream bound to `device`.
    pub fn instream(&self, device: &Device) -> Result<InStream, StreamError> {
        self.check_stream_target(device, DeviceAim::Input)?;
        Ok(InStream::new(Arc::clone(&self.backend), device.clone()))
    }

    fn check_stream_target(&self, device: &Device, aim: DeviceAim) -> Result<(), StreamError> {
        if self.disconnected.is_some() {
            return Err(StreamError::BackendDisconnected);
        }
        if device.aim != aim {
            return Err(StreamError::invalid(format!(
                "device {} is an {} device",
                device.id, device.aim
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend.kind())
            .field("app_name", &self.config.app_name)
            .field("devices", &self.devices)
            .field("disconnected", &self.disconnected)
            .finish()
    }
}

/// Cross-thread handle that wakes a blocked [`Context::wait_events`].
#[derive(Clone)]
pub struct Waker {
    backend: Arc<dyn Backend>,
}

impl Waker {
    pub fn wake(&self) {
        self.backend.wakeup();
    }
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waker")
            .field("backend", &self.backend.kind())
            .finish()
    }
}
