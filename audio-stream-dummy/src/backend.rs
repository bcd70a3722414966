use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use audio_stream_core::{
    AreaLayout, Backend, BackendEvent, BackendKind, Device, DeviceAim, DeviceDescriptor, DeviceList, OpenedStream,
    StreamError, StreamParams,
};

use crate::config::DummyBackendConfig;
use crate::stream::{DeviceLink, DummyStream};

#[derive(Default)]
struct EventQueue {
    events: Vec<BackendEvent>,
    woken: bool,
}

/// A stream's link, keyed by the device it was opened on.
struct LinkEntry {
    aim: DeviceAim,
    id: String,
    link: Weak<DeviceLink>,
}

/// Software backend with no system dependencies.
///
/// Advertises the devices from its [`DummyBackendConfig`] and runs every
/// started stream on its own thread, paced by the wall clock. The device set
/// can be changed at runtime to exercise hot-plug handling.
pub struct DummyBackend {
    period: Duration,
    devices: Mutex<Vec<DeviceDescriptor>>,
    queue: Mutex<EventQueue>,
    signal: Condvar,
    busy: Arc<AtomicBool>,
    disconnected: AtomicBool,
    links: Mutex<Vec<LinkEntry>>,
}

impl DummyBackend {
    pub fn new(config: DummyBackendConfig) -> Result<Arc<Self>, StreamError> {
        config.validate().map_err(StreamError::InitBackend)?;
        let devices = config
            .devices
            .into_iter()
            .map(|mut device| {
                device.sort_channel_layouts();
                device
            })
            .collect();
        Ok(Arc::new(Self {
            period: config.period,
            devices: Mutex::new(devices),
            queue: Mutex::new(EventQueue::default()),
            signal: Condvar::new(),
            busy: Arc::new(AtomicBool::new(false)),
            disconnected: AtomicBool::new(false),
            links: Mutex::new(Vec::new()),
        }))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Plugs in a device and queues [`BackendEvent::DevicesChanged`].
    pub fn add_device(&self, mut device: DeviceDescriptor) {
        log::info!("dummy {} device added: {}", device.aim, device.id);
        device.sort_channel_layouts();
        self.devices.lock().push(device);
        self.push_event(BackendEvent::DevicesChanged);
    }

    /// Unplugs every device with this id and direction. Streams open on it
    /// fault on their next cycle. Returns whether anything was removed.
    pub fn remove_device(&self, aim: DeviceAim, id: &str) -> bool {
        let removed = {
            let mut devices = self.devices.lock();
            let before = devices.len();
            devices.retain(|device| !(device.aim == aim && device.id == id));
            before != devices.len()
        };
        if !removed {
            return false;
        }
        log::info!("dummy {} device removed: {}", aim, id);
        for entry in self.links.lock().iter() {
            if entry.aim == aim && entry.id == id {
                if let Some(link) = entry.link.upgrade() {
                    link.device_removed();
                }
            }
        }
        self.push_event(BackendEvent::DevicesChanged);
        true
    }

    /// Simulates losing the connection to the audio server. Every stream
    /// faults and the context is notified once.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        log::warn!("dummy backend disconnected");
        for entry in self.links.lock().drain(..) {
            if let Some(link) = entry.link.upgrade() {
                link.backend_disconnected();
            }
        }
        self.push_event(BackendEvent::Disconnected(StreamError::BackendDisconnected));
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// While set, every stream start is refused with [`StreamError::DeviceBusy`].
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    fn push_event(&self, event: BackendEvent) {
        self.queue.lock().events.push(event);
        self.signal.notify_all();
    }

    fn open(&self, aim: DeviceAim, device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        if self.is_disconnected() {
            return Err(StreamError::BackendDisconnected);
        }
        let descriptor = self
            .devices
            .lock()
            .iter()
            .find(|candidate| candidate.aim == aim && candidate.id == device.id && candidate.is_raw == device.is_raw)
            .cloned()
            .ok_or(StreamError::NoSuchDevice)?;
        let caps = descriptor.capabilities()?;
        if !caps.supports_format(params.format) {
            return Err(StreamError::IncompatibleDevice(format!(
                "{} does not support {}",
                descriptor.id, params.format
            )));
        }
        if !caps.supports_sample_rate(params.sample_rate) {
            return Err(StreamError::IncompatibleDevice(format!(
                "{} does not support {} Hz",
                descriptor.id, params.sample_rate
            )));
        }
        if !caps.supports_layout(&params.layout) {
            return Err(StreamError::IncompatibleDevice(format!(
                "{} does not support layout {}",
                descriptor.id, params.layout
            )));
        }

        // The buffer must outlast at least two wakes of the stream thread.
        let latency = caps
            .clamp_software_latency(params.software_latency)
            .max(2.0 * self.period.as_secs_f64());
        let buffer_frames = params.frames_for(latency);
        let software_latency = buffer_frames as f64 * params.seconds_per_frame();

        let link = Arc::new(DeviceLink::default());
        {
            let mut links = self.links.lock();
            links.retain(|entry| entry.link.strong_count() > 0);
            links.push(LinkEntry {
                aim,
                id: descriptor.id.clone(),
                link: Arc::downgrade(&link),
            });
        }

        log::info!(
            "opened dummy {} stream '{}' on {}: {} {} Hz {}, {} frames buffered",
            aim,
            params.name,
            descriptor.id,
            params.format,
            params.sample_rate,
            params.layout,
            buffer_frames
        );
        let stream = DummyStream::new(aim, params.clone(), buffer_frames, self.period, Arc::clone(&self.busy), link);
        Ok(OpenedStream {
            control: Arc::new(stream),
            areas: AreaLayout::interleaved(params.channel_count(), params.bytes_per_sample()),
            software_latency,
        })
    }
}

impl Backend for DummyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dummy
    }

    fn enumerate_devices(&self) -> Result<DeviceList, StreamError> {
        if self.is_disconnected() {
            return Err(StreamError::BackendDisconnected);
        }
        let mut list = DeviceList::default();
        for descriptor in self.devices.lock().iter() {
            let device = Device::new(descriptor.clone());
            match descriptor.aim {
                DeviceAim::Input => list.inputs.push(device),
                DeviceAim::Output => list.outputs.push(device),
            }
        }
        list.default_input = (!list.inputs.is_empty()).then_some(0);
        list.default_output = (!list.outputs.is_empty()).then_some(0);
        Ok(list)
    }

    fn take_events(&self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.queue.lock().events)
    }

    fn wait_events(&self, timeout: Option<Duration>) {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut queue = self.queue.lock();
        while queue.events.is_empty() && !queue.woken {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut queue, deadline).timed_out() {
                        break;
                    }
                }
                None => self.signal.wait(&mut queue),
            }
        }
        queue.woken = false;
    }

    fn wakeup(&self) {
        self.queue.lock().woken = true;
        self.signal.notify_all();
    }

    fn force_device_rescan(&self) {
        self.push_event(BackendEvent::DevicesChanged);
    }

    fn open_outstream(&self, device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        self.open(DeviceAim::Output, device, params)
    }

    fn open_instream(&self, device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        self.open(DeviceAim::Input, device, params)
    }
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyBackend")
            .field("period", &self.period)
            .field("devices", &self.devices.lock().len())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}
