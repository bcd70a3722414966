//! Deterministic in-memory backend for unit tests. Cycles run on the test
//! thread when the test asks for them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{BackendKind, StreamParams};
use crate::models::device::{Device, DeviceAim, DeviceCapabilities, DeviceDescriptor, SampleRateRange};
use crate::models::error::StreamError;
use crate::models::format::SampleFormat;
use crate::models::layout::ChannelLayout;
use crate::processing::channel_areas::AreaLayout;
use crate::stream::driver::CycleReport;
use crate::traits::backend::{
    Backend, BackendEvent, CaptureRegion, DeviceList, OpenedStream, ReadTransport, StartRejected,
    StreamControl, StreamDriver, WriteTransport,
};

pub fn capabilities() -> DeviceCapabilities {
    DeviceCapabilities {
        layouts: vec![ChannelLayout::stereo(), ChannelLayout::mono()],
        current_layout: Some(ChannelLayout::stereo()),
        formats: vec![SampleFormat::FLOAT32_NE, SampleFormat::S16_NE],
        current_format: Some(SampleFormat::FLOAT32_NE),
        sample_rates: vec![SampleRateRange::new(44100, 48000)],
        sample_rate_current: 48000,
        software_latency_min: 0.001,
        software_latency_max: 1.0,
        software_latency_current: 0.02,
    }
}

pub fn output_device() -> Device {
    Device::new(DeviceDescriptor::new("manual-out", "Manual Output", DeviceAim::Output, capabilities()))
}

pub fn input_device() -> Device {
    Device::new(DeviceDescriptor::new("manual-in", "Manual Input", DeviceAim::Input, capabilities()))
}

/// A capture chunk queued for the input transport.
#[derive(Debug, Clone)]
pub enum Captured {
    Data(Vec<u8>),
    Hole(usize),
}

#[derive(Debug, Default)]
pub struct ManualTransport {
    bytes_per_frame: usize,
    /// Output: frames of space left this cycle.
    pub space: usize,
    /// Largest region lent by one begin call.
    pub max_bracket: usize,
    scratch: Vec<u8>,
    /// Output: every committed byte.
    pub played: Vec<u8>,
    /// Input: chunks waiting to be read.
    pub pending: VecDeque<Captured>,
    /// Error returned by the next end call.
    pub fail_end: Option<StreamError>,
}

impl ManualTransport {
    fn new(bytes_per_frame: usize) -> Self {
        Self {
            bytes_per_frame,
            max_bracket: usize::MAX,
            ..Self::default()
        }
    }
}

impl WriteTransport for ManualTransport {
    fn begin_write(&mut self, frame_count: usize) -> Result<(&mut [u8], usize), StreamError> {
        let frames = frame_count.min(self.space).min(self.max_bracket);
        self.scratch.clear();
        self.scratch.resize(frames * self.bytes_per_frame, 0);
        Ok((self.scratch.as_mut_slice(), frames))
    }

    fn end_write(&mut self, frame_count: usize) -> Result<(), StreamError> {
        self.played
            .extend_from_slice(&self.scratch[..frame_count * self.bytes_per_frame]);
        self.space -= frame_count;
        match self.fail_end.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn latency(&self) -> Result<f64, StreamError> {
        Ok(0.01)
    }
}

impl ReadTransport for ManualTransport {
    fn begin_read(&mut self, frame_count: usize) -> Result<CaptureRegion<'_>, StreamError> {
        let limit = frame_count.min(self.max_bracket);
        Ok(match self.pending.front() {
            None => CaptureRegion::Hole(0),
            Some(Captured::Hole(frames)) => CaptureRegion::Hole((*frames).min(limit)),
            Some(Captured::Data(bytes)) => {
                let frames = (bytes.len() / self.bytes_per_frame).min(limit);
                CaptureRegion::Data(&bytes[..frames * self.bytes_per_frame], frames)
            }
        })
    }

    fn end_read(&mut self, frame_count: usize) -> Result<(), StreamError> {
        let bytes_per_frame = self.bytes_per_frame;
        let exhausted = match self.pending.front_mut() {
            None => true,
            Some(Captured::Hole(frames)) => {
                *frames -= frame_count;
                *frames == 0
            }
            Some(Captured::Data(bytes)) => {
                bytes.drain(..frame_count * bytes_per_frame);
                bytes.is_empty()
            }
        };
        if exhausted {
            self.pending.pop_front();
        }
        match self.fail_end.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn latency(&self) -> Result<f64, StreamError> {
        Ok(0.005)
    }
}

pub struct ManualControl {
    busy: Arc<AtomicBool>,
    driver: Mutex<Option<StreamDriver>>,
    pub transport: Mutex<ManualTransport>,
    pub pause_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub stopped: AtomicBool,
}

impl ManualControl {
    pub fn is_running(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Runs one playback cycle with `space` frames available.
    pub fn output_cycle(&self, space: usize, frame_count_min: usize) -> CycleReport {
        let mut transport = self.transport.lock();
        transport.space = space;
        match self.driver.lock().as_mut() {
            Some(StreamDriver::Output(driver)) => driver.run_cycle(&mut *transport, frame_count_min, space),
            _ => panic!("no output driver running"),
        }
    }

    /// Runs one capture cycle offering `available` frames.
    pub fn input_cycle(&self, available: usize, frame_count_min: usize) -> CycleReport {
        let mut transport = self.transport.lock();
        match self.driver.lock().as_mut() {
            Some(StreamDriver::Input(driver)) => driver.run_cycle(&mut *transport, frame_count_min, available),
            _ => panic!("no input driver running"),
        }
    }

    pub fn report_error(&self, error: StreamError) {
        match self.driver.lock().as_mut() {
            Some(StreamDriver::Output(driver)) => driver.report_error(error),
            Some(StreamDriver::Input(driver)) => driver.report_error(error),
            None => panic!("no driver running"),
        }
    }
}

impl StreamControl for ManualControl {
    fn start(&self, driver: StreamDriver) -> Result<(), StartRejected> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(StartRejected::new(StreamError::DeviceBusy, driver));
        }
        *self.driver.lock() = Some(driver);
        Ok(())
    }

    fn pause(&self, _pause: bool) -> Result<(), StreamError> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear_buffer(&self) -> Result<(), StreamError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.driver.lock().take();
    }
}

#[derive(Default)]
pub struct ManualBackend {
    pub devices: Mutex<DeviceList>,
    events: Mutex<Vec<BackendEvent>>,
    pub busy: Arc<AtomicBool>,
    pub fail_open: Mutex<Option<StreamError>>,
    /// Replaces the interleaved layout handed out at open.
    pub areas_override: Mutex<Option<AreaLayout>>,
    pub scans: AtomicUsize,
    pub wakeups: AtomicUsize,
    last: Mutex<Option<Arc<ManualControl>>>,
}

impl ManualBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        *backend.devices.lock() = DeviceList {
            inputs: vec![input_device()],
            outputs: vec![output_device()],
            default_input: Some(0),
            default_output: Some(0),
        };
        Arc::new(backend)
    }

    pub fn push_event(&self, event: BackendEvent) {
        self.events.lock().push(event);
    }

    /// Control of the most recently opened stream.
    pub fn control(&self) -> Arc<ManualControl> {
        match self.last.lock().as_ref() {
            Some(control) => Arc::clone(control),
            None => panic!("no stream opened"),
        }
    }

    fn open(&self, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        if let Some(err) = self.fail_open.lock().take() {
            return Err(err);
        }
        let areas = self
            .areas_override
            .lock()
            .clone()
            .unwrap_or_else(|| AreaLayout::interleaved(params.channel_count(), params.bytes_per_sample()));
        let control = Arc::new(ManualControl {
            busy: Arc::clone(&self.busy),
            driver: Mutex::new(None),
            transport: Mutex::new(ManualTransport::new(params.bytes_per_frame())),
            pause_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        });
        *self.last.lock() = Some(Arc::clone(&control));
        Ok(OpenedStream {
            control,
            areas,
            software_latency: params.software_latency,
        })
    }
}

impl Backend for ManualBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dummy
    }

    fn enumerate_devices(&self) -> Result<DeviceList, StreamError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().clone())
    }

    fn take_events(&self) -> Vec<BackendEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn wait_events(&self, _timeout: Option<Duration>) {}

    fn wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::SeqCst);
    }

    fn open_outstream(&self, _device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        self.open(params)
    }

    fn open_instream(&self, _device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError> {
        self.open(params)
    }
}
