//! Stream control and realtime threads of the software backend.
//!
//! Each started stream gets one thread that wakes once per period, advances
//! the simulated device by the frames that elapsed in wall-clock time and
//! then runs one callback cycle:
//!
//! ```text
//! playback: drain(elapsed) → [underflow?] → run_cycle(min, free)
//! capture:  capture(elapsed) → [overflow?] → run_cycle(min, fill)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use audio_stream_core::{
    DeviceAim, InStreamDriver, OutStreamDriver, StartRejected, StreamControl, StreamDriver, StreamError,
    StreamParams,
};

use crate::hardware::{FrameClock, HardwareBuffer};

const LINK_OK: u8 = 0;
const LINK_DEVICE_REMOVED: u8 = 1;
const LINK_BACKEND_DISCONNECTED: u8 = 2;

/// Connection between a stream and the device it was opened on. The backend
/// breaks it when the device disappears or the backend disconnects.
#[derive(Debug, Default)]
pub(crate) struct DeviceLink {
    status: AtomicU8,
}

impl DeviceLink {
    pub(crate) fn device_removed(&self) {
        let _ = self
            .status
            .compare_exchange(LINK_OK, LINK_DEVICE_REMOVED, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn backend_disconnected(&self) {
        self.status.store(LINK_BACKEND_DISCONNECTED, Ordering::Release);
    }

    fn broken(&self) -> Option<StreamError> {
        match self.status.load(Ordering::Acquire) {
            LINK_OK => None,
            LINK_DEVICE_REMOVED => Some(StreamError::Streaming),
            _ => Some(StreamError::BackendDisconnected),
        }
    }
}

/// Everything the stream thread needs besides the driver.
struct StreamTiming {
    period: Duration,
    period_frames: usize,
    buffer: HardwareBuffer,
}

/// Control side of one opened dummy stream.
pub struct DummyStream {
    aim: DeviceAim,
    params: StreamParams,
    buffer_frames: usize,
    period: Duration,
    busy: Arc<AtomicBool>,
    link: Arc<DeviceLink>,
    running: Arc<AtomicBool>,
    clear_requested: Arc<AtomicBool>,
    volume: AtomicU64,
    stream_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl DummyStream {
    pub(crate) fn new(
        aim: DeviceAim,
        params: StreamParams,
        buffer_frames: usize,
        period: Duration,
        busy: Arc<AtomicBool>,
        link: Arc<DeviceLink>,
    ) -> Self {
        Self {
            aim,
            params,
            buffer_frames,
            period,
            busy,
            link,
            running: Arc::new(AtomicBool::new(false)),
            clear_requested: Arc::new(AtomicBool::new(false)),
            volume: AtomicU64::new(1.0f64.to_bits()),
            stream_handle: Mutex::new(None),
        }
    }

    /// Capacity of the simulated device buffer in frames.
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn timing(&self) -> StreamTiming {
        let period_frames = ((self.period.as_secs_f64() * f64::from(self.params.sample_rate)).ceil() as usize).max(1);
        StreamTiming {
            period: self.period,
            period_frames,
            buffer: HardwareBuffer::new(&self.params, self.buffer_frames),
        }
    }
}

impl StreamControl for DummyStream {
    fn start(&self, driver: StreamDriver) -> Result<(), StartRejected> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(StartRejected::new(StreamError::DeviceBusy, driver));
        }
        if let Some(error) = self.link.broken() {
            return Err(StartRejected::new(error, driver));
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(StartRejected::new(
                StreamError::invalid("dummy stream already running"),
                driver,
            ));
        }
        let driver = match (self.aim, driver) {
            (DeviceAim::Output, driver @ StreamDriver::Output(_))
            | (DeviceAim::Input, driver @ StreamDriver::Input(_)) => driver,
            (_, driver) => {
                return Err(StartRejected::new(
                    StreamError::invalid("driver direction does not match the device"),
                    driver,
                ))
            }
        };

        self.running.store(true, Ordering::SeqCst);
        // The driver waits here until the thread claims it, so a failed spawn
        // can hand it back.
        let slot = Arc::new(Mutex::new(Some(driver)));
        let thread_slot = Arc::clone(&slot);
        let running = Arc::clone(&self.running);
        let clear_requested = Arc::clone(&self.clear_requested);
        let link = Arc::clone(&self.link);
        let timing = self.timing();
        let thread_name = format!("dummy-{}-{}", self.aim, self.params.name);

        let spawned = thread::Builder::new().name(thread_name).spawn(move || {
            let Some(driver) = thread_slot.lock().take() else {
                running.store(false, Ordering::SeqCst);
                return;
            };
            match driver {
                StreamDriver::Output(driver) => {
                    playback_loop(driver, timing, &running, &clear_requested, &link)
                }
                StreamDriver::Input(driver) => capture_loop(driver, timing, &running, &clear_requested, &link),
            }
            running.store(false, Ordering::SeqCst);
        });

        match spawned {
            Ok(handle) => {
                *self.stream_handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                log::error!("failed to spawn dummy stream thread: {}", e);
                let error = StreamError::SystemResources(format!("failed to spawn stream thread: {}", e));
                match slot.lock().take() {
                    Some(driver) => Err(StartRejected::new(error, driver)),
                    // The closure never ran, so the slot cannot be empty.
                    None => Ok(()),
                }
            }
        }
    }

    fn pause(&self, _pause: bool) -> Result<(), StreamError> {
        // The thread follows the stream state on its next wake.
        Ok(())
    }

    fn clear_buffer(&self) -> Result<(), StreamError> {
        if self.aim != DeviceAim::Output {
            return Err(StreamError::IncompatibleBackend);
        }
        self.clear_requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&self, volume: f64) -> Result<(), StreamError> {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.lock().take() {
            if handle.join().is_err() {
                log::error!("dummy {} stream thread panicked", self.aim);
            }
        }
    }
}

impl Drop for DummyStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DummyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyStream")
            .field("aim", &self.aim)
            .field("name", &self.params.name)
            .field("buffer_frames", &self.buffer_frames)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Playback thread body. Fills the whole buffer once, then keeps it topped
/// up while the simulated device plays it out.
fn playback_loop(
    mut driver: OutStreamDriver,
    timing: StreamTiming,
    running: &AtomicBool,
    clear_requested: &AtomicBool,
    link: &DeviceLink,
) {
    let StreamTiming {
        period,
        period_frames,
        mut buffer,
    } = timing;

    let mut last_short = false;
    if !driver.is_paused() {
        let free = buffer.free();
        last_short = driver.run_cycle(&mut buffer, free, free).xrun;
    }
    let mut clock = FrameClock::new(driver.params().sample_rate);

    while running.load(Ordering::SeqCst) {
        thread::sleep(period);
        if let Some(error) = link.broken() {
            driver.report_error(error);
            break;
        }
        if clear_requested.swap(false, Ordering::SeqCst) {
            buffer.clear();
        }
        // Paused devices stop consuming; time spent paused is not owed.
        let elapsed = clock.tick();
        if driver.is_paused() {
            continue;
        }
        if !driver.is_active() {
            break;
        }

        let missing = buffer.drain(elapsed);
        if missing > 0 && !last_short {
            driver.report_underflow();
        }
        let free = buffer.free();
        if free == 0 {
            last_short = false;
            continue;
        }
        // Enough to survive until the next wake.
        let min = period_frames.saturating_sub(buffer.fill()).min(free);
        last_short = driver.run_cycle(&mut buffer, min, free).xrun;
    }
}

/// Capture thread body. The device records continuously; the callback is
/// offered everything buffered.
fn capture_loop(
    mut driver: InStreamDriver,
    timing: StreamTiming,
    running: &AtomicBool,
    clear_requested: &AtomicBool,
    link: &DeviceLink,
) {
    let StreamTiming {
        period,
        period_frames,
        mut buffer,
    } = timing;

    let mut clock = FrameClock::new(driver.params().sample_rate);
    let mut last_short = false;

    while running.load(Ordering::SeqCst) {
        thread::sleep(period);
        if let Some(error) = link.broken() {
            driver.report_error(error);
            break;
        }
        if clear_requested.swap(false, Ordering::SeqCst) {
            buffer.clear();
        }
        let elapsed = clock.tick();
        if driver.is_paused() {
            continue;
        }
        if !driver.is_active() {
            break;
        }

        let lost = buffer.capture(elapsed);
        if lost > 0 && !last_short {
            driver.report_overflow();
        }
        let fill = buffer.fill();
        if fill == 0 {
            last_short = false;
            continue;
        }
        // Room for the next period must exist after this cycle.
        let min = (fill + period_frames).saturating_sub(buffer.capacity()).min(fill);
        last_short = driver.run_cycle(&mut buffer, min, fill).xrun;
    }
}
