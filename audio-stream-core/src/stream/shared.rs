use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::StreamDiagnostics;
use crate::models::error::StreamError;
use crate::models::state::{AtomicStreamState, StreamState};
use crate::traits::backend::StreamControl;

/// State shared by a stream handle, its controllers and its realtime driver.
///
/// Everything the realtime thread touches is atomic.
#[derive(Debug)]
pub struct StreamShared {
    id: Uuid,
    pub(crate) state: AtomicStreamState,
    callback_count: AtomicU64,
    frames_transferred: AtomicU64,
    underflow_count: AtomicU64,
    overflow_count: AtomicU64,
    opened_at: Mutex<Option<DateTime<Utc>>>,
}

impl StreamShared {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AtomicStreamState::new(StreamState::Created),
            callback_count: AtomicU64::new(0),
            frames_transferred: AtomicU64::new(0),
            underflow_count: AtomicU64::new(0),
            overflow_count: AtomicU64::new(0),
            opened_at: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state.load()
    }

    pub(crate) fn mark_opened(&self) {
        *self.opened_at.lock() = Some(Utc::now());
    }

    pub(crate) fn record_cycle(&self, frames: usize) {
        self.callback_count.fetch_add(1, Ordering::Relaxed);
        self.frames_transferred
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_underflow(&self) {
        self.underflow_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.overflow_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Moves the stream to `Faulted` unless it is already gone.
    pub(crate) fn fault(&self) {
        let _ = self.state.transition(StreamState::Faulted);
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        StreamDiagnostics {
            stream_id: self.id,
            opened_at: *self.opened_at.lock(),
            callback_count: self.callback_count.load(Ordering::Relaxed),
            frames_transferred: self.frames_transferred.load(Ordering::Relaxed),
            underflow_count: self.underflow_count.load(Ordering::Relaxed),
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
        }
    }
}

/// Error for an operation that needs a started, healthy stream.
pub(crate) fn require_started(state: StreamState, what: &'static str) -> Result<(), StreamError> {
    if state.is_faulted() {
        return Err(StreamError::Streaming);
    }
    if !state.is_started() {
        return Err(StreamError::invalid(what));
    }
    Ok(())
}

/// Cloneable handle for pausing, resuming and clearing a stream from any
/// non-realtime thread.
#[derive(Clone)]
pub struct StreamController {
    shared: Arc<StreamShared>,
    control: Arc<dyn StreamControl>,
}

impl StreamController {
    pub(crate) fn new(shared: Arc<StreamShared>, control: Arc<dyn StreamControl>) -> Self {
        Self { shared, control }
    }

    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Pauses or resumes. The state reflects the request when this returns;
    /// the backend stops invoking the callback at its next cycle boundary.
    /// Requesting the current state is a no-op.
    pub fn pause(&self, pause: bool) -> Result<(), StreamError> {
        let state = self.shared.state();
        require_started(state, "pause requires a started stream")?;
        if state.is_paused() == pause {
            return Ok(());
        }
        self.control.pause(pause)?;
        let next = if pause {
            StreamState::Paused
        } else {
            StreamState::Running
        };
        match self.shared.state.transition(next) {
            Ok(_) => {
                log::info!("stream {} {}", self.shared.id(), if pause { "paused" } else { "resumed" });
                Ok(())
            }
            Err(blocked) if blocked.is_faulted() => Err(StreamError::Streaming),
            // Another thread got there first.
            Err(blocked) if blocked == next => Ok(()),
            Err(_) => Err(StreamError::invalid("stream is no longer running")),
        }
    }

    pub fn clear_buffer(&self) -> Result<(), StreamError> {
        let state = self.shared.state();
        if state.is_faulted() {
            return Err(StreamError::Streaming);
        }
        if !state.is_open() {
            return Err(StreamError::invalid("clear_buffer requires an open stream"));
        }
        self.control.clear_buffer()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.shared.diagnostics()
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("id", &self.shared.id())
            .field("state", &self.shared.state())
            .finish()
    }
}
