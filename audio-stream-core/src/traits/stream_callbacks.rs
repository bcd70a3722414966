use crate::models::error::StreamError;
use crate::stream::protocol::{ReadContext, WriteContext};

/// Realtime playback callback.
///
/// Invoked on the backend's realtime thread once per buffer cycle, never
/// concurrently with itself. Implementations must not block, allocate or
/// take locks; hand data to other threads through a
/// [`RingBuffer`](crate::RingBuffer).
///
/// `frame_count_min` frames should be written through repeated
/// `begin_write`/`end_write` brackets; up to `frame_count_max` are accepted.
pub trait WriteCallback: Send {
    fn on_write(
        &mut self,
        stream: &mut WriteContext<'_>,
        frame_count_min: usize,
        frame_count_max: usize,
    );
}

impl<F> WriteCallback for F
where
    F: FnMut(&mut WriteContext<'_>, usize, usize) + Send,
{
    fn on_write(
        &mut self,
        stream: &mut WriteContext<'_>,
        frame_count_min: usize,
        frame_count_max: usize,
    ) {
        self(stream, frame_count_min, frame_count_max)
    }
}

/// Realtime capture callback. Same constraints as [`WriteCallback`].
pub trait ReadCallback: Send {
    fn on_read(
        &mut self,
        stream: &mut ReadContext<'_>,
        frame_count_min: usize,
        frame_count_max: usize,
    );
}

impl<F> ReadCallback for F
where
    F: FnMut(&mut ReadContext<'_>, usize, usize) + Send,
{
    fn on_read(
        &mut self,
        stream: &mut ReadContext<'_>,
        frame_count_min: usize,
        frame_count_max: usize,
    ) {
        self(stream, frame_count_min, frame_count_max)
    }
}

/// Stream notifications.
///
/// All methods are called from the realtime thread and share the realtime
/// constraints. After `on_error` the stream is faulted; schedule its
/// destruction from another thread.
pub trait StreamDelegate: Send {
    /// The playback buffer ran dry.
    fn on_underflow(&mut self) {}

    /// Captured frames were dropped because the callback fell behind.
    fn on_overflow(&mut self) {}

    /// The stream hit an unrecoverable error.
    fn on_error(&mut self, _error: &StreamError) {}
}

/// Delegate that ignores every notification. Counters in
/// [`StreamDiagnostics`](crate::StreamDiagnostics) still record xruns.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl StreamDelegate for NoopDelegate {}
