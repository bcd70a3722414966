use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::{BackendKind, StreamParams};
use crate::models::device::Device;
use crate::models::error::StreamError;
use crate::processing::channel_areas::AreaLayout;
use crate::stream::driver::{InStreamDriver, OutStreamDriver};

/// Snapshot of every device a backend currently exposes.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub inputs: Vec<Device>,
    pub outputs: Vec<Device>,
    /// Index into `inputs`.
    pub default_input: Option<usize>,
    /// Index into `outputs`.
    pub default_output: Option<usize>,
}

/// Asynchronous notification queued by a backend for the event pump.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    DevicesChanged,
    Disconnected(StreamError),
}

/// Connection to an audio subsystem.
///
/// Implemented by:
/// - `DummyBackend` (software, `audio-stream-dummy`)
///
/// Every method is called from non-realtime threads.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Probes every device. Devices whose probing failed are still listed
    /// with their probe error.
    fn enumerate_devices(&self) -> Result<DeviceList, StreamError>;

    /// Drains queued events without blocking.
    fn take_events(&self) -> Vec<BackendEvent>;

    /// Blocks until an event is queued, [`wakeup`](Self::wakeup) is called or
    /// `timeout` elapses.
    fn wait_events(&self, timeout: Option<Duration>);

    /// Unblocks a pending [`wait_events`](Self::wait_events). Callable from any thread.
    fn wakeup(&self);

    /// Asks the backend to rescan and queue [`BackendEvent::DevicesChanged`].
    fn force_device_rescan(&self) {}

    /// Allocates backend resources for a playback stream. The callback thread
    /// is not running until [`StreamControl::start`].
    fn open_outstream(&self, device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError>;

    fn open_instream(&self, device: &Device, params: &StreamParams) -> Result<OpenedStream, StreamError>;
}

/// What a backend hands back from a successful open.
pub struct OpenedStream {
    pub control: Arc<dyn StreamControl>,
    /// Placement of each channel inside the regions the transport lends.
    pub areas: AreaLayout,
    /// Latency the backend actually configured, in seconds.
    pub software_latency: f64,
}

/// Non-realtime control surface of an opened stream.
pub trait StreamControl: Send + Sync {
    /// Starts invoking the driver's callback from the backend's realtime
    /// thread. On failure the driver is handed back so the stream can retry.
    fn start(&self, driver: StreamDriver) -> Result<(), StartRejected>;

    /// Halts or resumes callback invocation. Takes effect at the next cycle
    /// boundary.
    fn pause(&self, pause: bool) -> Result<(), StreamError>;

    /// Drops buffered but unplayed audio.
    fn clear_buffer(&self) -> Result<(), StreamError> {
        Err(StreamError::IncompatibleBackend)
    }

    fn set_volume(&self, _volume: f64) -> Result<(), StreamError> {
        Err(StreamError::IncompatibleBackend)
    }

    /// Stops the realtime thread and waits for it. Idempotent.
    fn stop(&self);
}

/// Realtime half of a started stream, moved onto the backend's thread.
pub enum StreamDriver {
    Output(OutStreamDriver),
    Input(InStreamDriver),
}

impl StreamDriver {
    pub fn into_output(self) -> Option<OutStreamDriver> {
        match self {
            Self::Output(driver) => Some(driver),
            Self::Input(_) => None,
        }
    }

    pub fn into_input(self) -> Option<InStreamDriver> {
        match self {
            Self::Input(driver) => Some(driver),
            Self::Output(_) => None,
        }
    }
}

/// A refused [`StreamControl::start`].
pub struct StartRejected {
    pub error: StreamError,
    pub driver: StreamDriver,
}

impl StartRejected {
    pub fn new(error: StreamError, driver: StreamDriver) -> Self {
        Self { error, driver }
    }
}

/// Backend buffer a playback driver writes into during one cycle.
///
/// Called only from the realtime thread. A region obtained from
/// `begin_write` and never ended is abandoned: the next `begin_write` lends
/// the same position again.
pub trait WriteTransport {
    /// Lends a region for up to `frame_count` frames laid out per the
    /// stream's [`AreaLayout`]. Returns the region and the frames it holds,
    /// zero when no space is left this cycle.
    fn begin_write(&mut self, frame_count: usize) -> Result<(&mut [u8], usize), StreamError>;

    /// Commits `frame_count` frames of the lent region. May report
    /// [`StreamError::Underflow`] after committing.
    fn end_write(&mut self, frame_count: usize) -> Result<(), StreamError>;

    /// Seconds until a frame written now is heard.
    fn latency(&self) -> Result<f64, StreamError>;
}

/// Captured region lent by a [`ReadTransport`].
#[derive(Debug)]
pub enum CaptureRegion<'a> {
    Data(&'a [u8], usize),
    /// Frames the backend lost; the application treats them as silence.
    Hole(usize),
}

/// Backend buffer a capture driver reads from during one cycle.
pub trait ReadTransport {
    fn begin_read(&mut self, frame_count: usize) -> Result<CaptureRegion<'_>, StreamError>;

    /// Releases `frame_count` frames, data or hole.
    fn end_read(&mut self, frame_count: usize) -> Result<(), StreamError>;

    /// Seconds since the oldest unread frame was captured.
    fn latency(&self) -> Result<f64, StreamError>;
}
