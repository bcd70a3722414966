use std::sync::Arc;

use crate::models::audio_models::StreamParams;
use crate::models::error::StreamError;
use crate::models::state::StreamState;
use crate::processing::channel_areas::AreaLayout;
use crate::traits::backend::{ReadTransport, WriteTransport};
use crate::traits::stream_callbacks::{ReadCallback, StreamDelegate, WriteCallback};

use super::protocol::{CycleSummary, ReadContext, WriteContext};
use super::shared::StreamShared;

/// Result of one [`OutStreamDriver::run_cycle`] or [`InStreamDriver::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Frames committed through the protocol.
    pub frames: usize,
    /// The cycle was counted as an underflow or overflow.
    pub xrun: bool,
    /// The cycle was skipped because the stream does not accept transfers.
    pub skipped: bool,
}

impl CycleReport {
    const SKIPPED: Self = Self {
        frames: 0,
        xrun: false,
        skipped: true,
    };
}

/// Moves `Started` to `Running` on the first cycle. Returns whether the
/// cycle may run.
fn enter_cycle(shared: &StreamShared) -> bool {
    let state = shared.state.load();
    if state == StreamState::Started {
        shared
            .state
            .transition_from(StreamState::Started, StreamState::Running);
    }
    state.accepts_transfers()
}

/// Shared bookkeeping after a callback returns. `short` is whether the
/// callback moved fewer than `frame_count_min` frames.
fn settle_cycle(shared: &StreamShared, summary: CycleSummary, short: bool) -> (CycleReport, Option<StreamError>) {
    shared.record_cycle(summary.frames);
    if summary.fault.is_some() {
        let report = CycleReport {
            frames: summary.frames,
            ..CycleReport::default()
        };
        return (report, summary.fault);
    }
    // A pause requested from inside the callback excuses the shortfall.
    let xrun = summary.xrun || (short && !shared.state.load().is_paused());
    let report = CycleReport {
        frames: summary.frames,
        xrun,
        skipped: false,
    };
    (report, None)
}

/// Realtime half of a playback stream.
///
/// Owned by the backend's realtime thread after start. The backend calls
/// [`run_cycle`](Self::run_cycle) once per buffer cycle with the transport
/// for that cycle.
pub struct OutStreamDriver {
    shared: Arc<StreamShared>,
    params: StreamParams,
    areas: AreaLayout,
    callback: Box<dyn WriteCallback>,
    delegate: Box<dyn StreamDelegate>,
}

impl OutStreamDriver {
    pub(crate) fn new(
        shared: Arc<StreamShared>,
        params: StreamParams,
        areas: AreaLayout,
        callback: Box<dyn WriteCallback>,
        delegate: Box<dyn StreamDelegate>,
    ) -> Self {
        Self {
            shared,
            params,
            areas,
            callback,
            delegate,
        }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn WriteCallback>, Box<dyn StreamDelegate>) {
        (self.callback, self.delegate)
    }

    /// Invokes the write callback for one cycle.
    ///
    /// Writing fewer than `frame_count_min` frames counts as an underflow and
    /// notifies the delegate. A fatal transport error faults the stream and
    /// is delivered through [`StreamDelegate::on_error`].
    pub fn run_cycle(
        &mut self,
        transport: &mut dyn WriteTransport,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> CycleReport {
        if !enter_cycle(&self.shared) {
            return CycleReport::SKIPPED;
        }
        let mut context = WriteContext::new(&self.shared, &self.params, &self.areas, transport);
        self.callback
            .on_write(&mut context, frame_count_min, frame_count_max);
        debug_assert!(
            !context.is_bracket_open(),
            "write callback returned inside a begin_write/end_write bracket"
        );
        let summary = context.finish();
        let short = summary.frames < frame_count_min;
        let (report, fault) = settle_cycle(&self.shared, summary, short);
        if let Some(error) = fault {
            self.delegate.on_error(&error);
        } else if report.xrun {
            self.report_underflow();
        }
        report
    }

    /// Records an underflow detected by the backend outside the protocol.
    pub fn report_underflow(&mut self) {
        self.shared.record_underflow();
        self.delegate.on_underflow();
    }

    /// Faults the stream and notifies the delegate.
    pub fn report_error(&mut self, error: StreamError) {
        self.shared.fault();
        self.delegate.on_error(&error);
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.load()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    /// Whether the backend should keep invoking cycles.
    pub fn is_active(&self) -> bool {
        self.state().accepts_transfers()
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }
}

/// Realtime half of a capture stream.
pub struct InStreamDriver {
    shared: Arc<StreamShared>,
    params: StreamParams,
    areas: AreaLayout,
    callback: Box<dyn ReadCallback>,
    delegate: Box<dyn StreamDelegate>,
}

impl InStreamDriver {
    pub(crate) fn new(
        shared: Arc<StreamShared>,
        params: StreamParams,
        areas: AreaLayout,
        callback: Box<dyn ReadCallback>,
        delegate: Box<dyn StreamDelegate>,
    ) -> Self {
        Self {
            shared,
            params,
            areas,
            callback,
            delegate,
        }
    }

    pub(crate) fn into_parts(self) -> (Box<dyn ReadCallback>, Box<dyn StreamDelegate>) {
        (self.callback, self.delegate)
    }

    /// Invokes the read callback for one cycle. Reading fewer than
    /// `frame_count_min` frames counts as an overflow.
    pub fn run_cycle(
        &mut self,
        transport: &mut dyn ReadTransport,
        frame_count_min: usize,
        frame_count_max: usize,
    ) -> CycleReport {
        if !enter_cycle(&self.shared) {
            return CycleReport::SKIPPED;
        }
        let mut context = ReadContext::new(&self.shared, &self.params, &self.areas, transport);
        self.callback
            .on_read(&mut context, frame_count_min, frame_count_max);
        debug_assert!(
            !context.is_bracket_open(),
            "read callback returned inside a begin_read/end_read bracket"
        );
        let summary = context.finish();
        let short = summary.frames < frame_count_min;
        let (report, fault) = settle_cycle(&self.shared, summary, short);
        if let Some(error) = fault {
            self.delegate.on_error(&error);
        } else if report.xrun {
            self.report_overflow();
        }
        report
    }

    /// Records captured frames the backend had to drop.
    pub fn report_overflow(&mut self) {
        self.shared.record_overflow();
        self.delegate.on_overflow();
    }

    pub fn report_error(&mut self, error: StreamError) {
        self.shared.fault();
        self.delegate.on_error(&error);
    }

    pub fn state(&self) -> StreamState {
        self.shared.state.load()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused()
    }

    pub fn is_active(&self) -> bool {
        self.state().accepts_transfers()
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }
}
