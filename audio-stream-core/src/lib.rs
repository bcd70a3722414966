//! # audio-stream-core
//!
//! Backend-agnostic realtime audio streaming core.
//!
//! Provides the lock-free ring buffer, per-channel buffer views, the
//! Begin/End transfer protocol and the stream lifecycle. Backends (the
//! software `audio-stream-dummy`, future system backends) implement the
//! `Backend` trait and drive each started stream's realtime callback.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/       ← Backend, StreamControl, transports, WriteCallback/ReadCallback, delegates
//! ├── models/       ← StreamError, StreamState, SampleFormat, ChannelLayout, Device, configs
//! ├── processing/   ← RingBuffer, ChannelAreas, SineWave
//! ├── stream/       ← OutStream/InStream, Begin/End protocol, realtime drivers, negotiation
//! └── session/      ← Context (event pump, device snapshot)
//! ```
//!
//! ## Threads
//!
//! ```text
//! [app thread]  Context::flush_events / OutStream::open, start, pause, drop
//!                     │
//! [backend RT thread] OutStreamDriver::run_cycle → WriteCallback
//!                     │   begin_write → ChannelAreasMut → end_write
//!                     ↕ RingProducer / RingConsumer
//! [app I/O thread]    disk, synthesis, ...
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod stream;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{BackendKind, StreamDiagnostics, StreamParams};
pub use models::config::{ContextConfig, StreamConfig};
pub use models::device::{Device, DeviceAim, DeviceCapabilities, DeviceDescriptor, SampleRateRange};
pub use models::error::{ErrorClass, StreamError};
pub use models::format::SampleFormat;
pub use models::layout::{BuiltinLayout, ChannelId, ChannelLayout};
pub use models::state::StreamState;
pub use processing::channel_areas::{AreaLayout, ChannelArea, ChannelAreas, ChannelAreasMut};
pub use processing::ring_buffer::{RingBuffer, RingConsumer, RingProducer, StagedWrite};
pub use processing::sine::SineWave;
pub use session::context::{Context, Waker};
pub use stream::driver::{CycleReport, InStreamDriver, OutStreamDriver};
pub use stream::protocol::{CapturedFrames, ReadContext, WriteContext};
pub use stream::shared::StreamController;
pub use stream::{InStream, OutStream};
pub use traits::backend::{
    Backend, BackendEvent, CaptureRegion, DeviceList, OpenedStream, ReadTransport, StartRejected,
    StreamControl, StreamDriver, WriteTransport,
};
pub use traits::context_delegate::ContextDelegate;
pub use traits::stream_callbacks::{NoopDelegate, ReadCallback, StreamDelegate, WriteCallback};
