//! Begin/End transfer protocol seen by realtime callbacks.
//!
//! Each callback invocation receives a context for exactly one cycle. Inside
//! it the callback repeats `begin_*`/`end_*` brackets until it has moved the
//! frames it wants or the backend reports that nothing is left this cycle:
//!
//! ```text
//! closed ──begin(n>0 frames)──→ open ──end──→ closed
//!    └────begin(0 frames)────→ empty ──end──→ closed
//! ```
//!
//! Begin while a bracket is open, or End while none is, is rejected with
//! [`StreamError::Invalid`] and leaves the bracket untouched. Channel views
//! borrow the context, so they cannot outlive their bracket.
//!
//! Nothing here allocates or locks.

use crate::models::audio_models::StreamParams;
use crate::models::error::StreamError;
use crate::models::state::StreamState;
use crate::processing::channel_areas::{AreaLayout, ChannelAreas, ChannelAreasMut};
use crate::traits::backend::{CaptureRegion, ReadTransport, WriteTransport};

use super::shared::StreamShared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Closed,
    /// Begin reported zero frames; End is still owed.
    Empty,
    Open { frames: usize },
}

/// Records a fatal transport error against the cycle and the stream.
fn absorb(shared: &StreamShared, fault: &mut Option<StreamError>, error: StreamError) -> StreamError {
    if error.is_fatal() {
        shared.fault();
        if fault.is_none() {
            *fault = Some(error.clone());
        }
    }
    error
}

fn check_transfers(shared: &StreamShared, fault: &Option<StreamError>) -> Result<(), StreamError> {
    let state = shared.state.load();
    if fault.is_some() || state.is_faulted() {
        return Err(StreamError::Streaming);
    }
    if !state.accepts_transfers() {
        return Err(StreamError::invalid("transfer on a stream that is not started"));
    }
    Ok(())
}

/// Flips between running and paused from inside the callback. Only the
/// shared state changes; the backend honours it at the next cycle boundary.
fn pause_in_cycle(shared: &StreamShared, pause: bool) -> Result<(), StreamError> {
    let state = shared.state.load();
    if state.is_faulted() {
        return Err(StreamError::Streaming);
    }
    if state.is_paused() == pause {
        return Ok(());
    }
    let next = if pause {
        StreamState::Paused
    } else {
        StreamState::Running
    };
    shared
        .state
        .transition(next)
        .map(|_| ())
        .map_err(|_| StreamError::invalid("stream cannot change pause state"))
}

/// Playback side of one callback cycle.
pub struct WriteContext<'a> {
    shared: &'a StreamShared,
    params: &'a StreamParams,
    areas: &'a AreaLayout,
    transport: &'a mut dyn WriteTransport,
    bracket: Bracket,
    frames_written: usize,
    underflowed: bool,
    fault: Option<StreamError>,
}

impl<'a> WriteContext<'a> {
    pub(crate) fn new(
        shared: &'a StreamShared,
        params: &'a StreamParams,
        areas: &'a AreaLayout,
        transport: &'a mut dyn WriteTransport,
    ) -> Self {
        Self {
            shared,
            params,
            areas,
            transport,
            bracket: Bracket::Closed,
            frames_written: 0,
            underflowed: false,
            fault: None,
        }
    }

    /// Lends writable channel areas for up to `frame_count` frames.
    ///
    /// `Ok(None)` means the backend has no space left this cycle; the bracket
    /// must still be closed with [`end_write`](Self::end_write), after which
    /// the callback should return.
    pub fn begin_write(&mut self, frame_count: usize) -> Result<Option<ChannelAreasMut<'_>>, StreamError> {
        check_transfers(self.shared, &self.fault)?;
        if self.bracket != Bracket::Closed {
            return Err(StreamError::invalid("begin_write called twice without end_write"));
        }
        if frame_count == 0 {
            return Err(StreamError::invalid("begin_write requested zero frames"));
        }
        match self.transport.begin_write(frame_count) {
            Err(error) => Err(absorb(self.shared, &mut self.fault, error)),
            Ok((_, 0)) => {
                self.bracket = Bracket::Empty;
                Ok(None)
            }
            Ok((region, frames)) => {
                debug_assert!(frames <= frame_count, "transport lent more frames than requested");
                match ChannelAreasMut::new(region, self.areas, frames) {
                    Ok(areas) => {
                        self.bracket = Bracket::Open { frames };
                        Ok(Some(areas))
                    }
                    Err(_) => Err(absorb(self.shared, &mut self.fault, StreamError::Streaming)),
                }
            }
        }
    }

    /// Commits the frames lent by the matching [`begin_write`](Self::begin_write).
    ///
    /// An [`StreamError::Underflow`] return is informational: the frames were
    /// committed and the bracket is closed.
    pub fn end_write(&mut self) -> Result<(), StreamError> {
        let frames = match self.bracket {
            Bracket::Closed => return Err(StreamError::invalid("end_write without begin_write")),
            Bracket::Empty => {
                self.bracket = Bracket::Closed;
                return Ok(());
            }
            Bracket::Open { frames } => frames,
        };
        self.bracket = Bracket::Closed;
        match self.transport.end_write(frames) {
            Ok(()) => {
                self.frames_written += frames;
                Ok(())
            }
            Err(StreamError::Underflow) => {
                self.frames_written += frames;
                self.underflowed = true;
                Err(StreamError::Underflow)
            }
            Err(error) => Err(absorb(self.shared, &mut self.fault, error)),
        }
    }

    /// Pauses or resumes from inside the callback.
    pub fn pause(&mut self, pause: bool) -> Result<(), StreamError> {
        pause_in_cycle(self.shared, pause)
    }

    /// Seconds until a frame written now is heard.
    pub fn latency(&self) -> Result<f64, StreamError> {
        self.transport.latency()
    }

    pub fn params(&self) -> &StreamParams {
        self.params
    }

    pub fn seconds_per_frame(&self) -> f64 {
        self.params.seconds_per_frame()
    }

    /// Frames committed so far this cycle.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub(crate) fn is_bracket_open(&self) -> bool {
        self.bracket != Bracket::Closed
    }

    pub(crate) fn finish(self) -> CycleSummary {
        CycleSummary {
            frames: self.frames_written,
            xrun: self.underflowed,
            fault: self.fault,
        }
    }
}

/// What a capture bracket yielded.
#[derive(Debug)]
pub enum CapturedFrames<'a> {
    Areas(ChannelAreas<'a>),
    /// Frames lost by the backend. Treat them as silence.
    Hole(usize),
    /// Nothing left this cycle. End the bracket and return.
    Empty,
}

impl CapturedFrames<'_> {
    /// Frames covered by the bracket, data or hole.
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Areas(areas) => areas.frame_count(),
            Self::Hole(frames) => *frames,
            Self::Empty => 0,
        }
    }
}

/// Capture side of one callback cycle.
pub struct ReadContext<'a> {
    shared: &'a StreamShared,
    params: &'a StreamParams,
    areas: &'a AreaLayout,
    transport: &'a mut dyn ReadTransport,
    bracket: Bracket,
    frames_read: usize,
    fault: Option<StreamError>,
}

impl<'a> ReadContext<'a> {
    pub(crate) fn new(
        shared: &'a StreamShared,
        params: &'a StreamParams,
        areas: &'a AreaLayout,
        transport: &'a mut dyn ReadTransport,
    ) -> Self {
        Self {
            shared,
            params,
            areas,
            transport,
            bracket: Bracket::Closed,
            frames_read: 0,
            fault: None,
        }
    }

    /// Lends captured frames, up to `frame_count`. Every outcome, including
    /// [`CapturedFrames::Empty`], must be closed with [`end_read`](Self::end_read).
    pub fn begin_read(&mut self, frame_count: usize) -> Result<CapturedFrames<'_>, StreamError> {
        check_transfers(self.shared, &self.fault)?;
        if self.bracket != Bracket::Closed {
            return Err(StreamError::invalid("begin_read called twice without end_read"));
        }
        if frame_count == 0 {
            return Err(StreamError::invalid("begin_read requested zero frames"));
        }
        match self.transport.begin_read(frame_count) {
            Err(error) => Err(absorb(self.shared, &mut self.fault, error)),
            Ok(CaptureRegion::Data(_, 0)) | Ok(CaptureRegion::Hole(0)) => {
                self.bracket = Bracket::Empty;
                Ok(CapturedFrames::Empty)
            }
            Ok(CaptureRegion::Hole(frames)) => {
                debug_assert!(frames <= frame_count, "transport lent more frames than requested");
                self.bracket = Bracket::Open { frames };
                Ok(CapturedFrames::Hole(frames))
            }
            Ok(CaptureRegion::Data(region, frames)) => {
                debug_assert!(frames <= frame_count, "transport lent more frames than requested");
                match ChannelAreas::new(region, self.areas, frames) {
                    Ok(areas) => {
                        self.bracket = Bracket::Open { frames };
                        Ok(CapturedFrames::Areas(areas))
                    }
                    Err(_) => Err(absorb(self.shared, &mut self.fault, StreamError::Streaming)),
                }
            }
        }
    }

    /// Releases the frames lent by the matching [`begin_read`](Self::begin_read).
    pub fn end_read(&mut self) -> Result<(), StreamError> {
        let frames = match self.bracket {
            Bracket::Closed => return Err(StreamError::invalid("end_read without begin_read")),
            Bracket::Empty => {
                self.bracket = Bracket::Closed;
                return Ok(());
            }
            Bracket::Open { frames } => frames,
        };
        self.bracket = Bracket::Closed;
        match self.transport.end_read(frames) {
            Ok(()) => {
                self.frames_read += frames;
                Ok(())
            }
            Err(error) => Err(absorb(self.shared, &mut self.fault, error)),
        }
    }

    pub fn pause(&mut self, pause: bool) -> Result<(), StreamError> {
        pause_in_cycle(self.shared, pause)
    }

    /// Seconds since the oldest unread frame was captured.
    pub fn latency(&self) -> Result<f64, StreamError> {
        self.transport.latency()
    }

    pub fn params(&self) -> &StreamParams {
        self.params
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    pub(crate) fn is_bracket_open(&self) -> bool {
        self.bracket != Bracket::Closed
    }

    pub(crate) fn finish(self) -> CycleSummary {
        CycleSummary {
            frames: self.frames_read,
            xrun: false,
            fault: self.fault,
        }
    }
}

pub(crate) struct CycleSummary {
    pub frames: usize,
    /// The transport reported an xrun during the cycle.
    pub xrun: bool,
    pub fault: Option<StreamError>,
}
