//! # audio-stream-dummy
//!
//! Software backend for audio-stream-core.
//!
//! Provides:
//! - `DummyBackend` — advertises a configurable device set and runs streams
//!   without touching any system audio library
//! - `DummyStream` — per-stream control; one thread per started stream
//!   drains (playback) or fills (capture) a simulated device buffer in
//!   wall-clock time
//! - `DummyBackendConfig` — device set and thread period
//!
//! Devices can be added, removed or disconnected at runtime, and starts can
//! be refused as busy, so hosts can exercise hot-plug and failure paths.
//!
//! ## Usage
//! ```ignore
//! use audio_stream_core::Context;
//! use audio_stream_dummy::{DummyBackend, DummyBackendConfig};
//!
//! let backend = DummyBackend::new(DummyBackendConfig::default()).unwrap();
//! let mut context = Context::connect(backend).unwrap();
//! context.flush_events().unwrap();
//! let device = context.default_output_device().unwrap();
//! let mut stream = context.outstream(&device).unwrap();
//! ```

pub mod backend;
pub mod config;
mod hardware;
pub mod stream;

pub use backend::DummyBackend;
pub use config::{dummy_capabilities, DummyBackendConfig};
pub use stream::DummyStream;
