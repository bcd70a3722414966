use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by streams, backends and the context.
///
/// The set is closed: backends map their native failures onto these variants
/// so that callers can decide on recovery via [`StreamError::class`].
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamError {
    #[error("out of memory")]
    NoMem,

    #[error("unable to initialize audio backend: {0}")]
    InitBackend(String),

    #[error("system resource not available: {0}")]
    SystemResources(String),

    #[error("unable to open device: {0}")]
    OpeningDevice(String),

    #[error("no such device")]
    NoSuchDevice,

    #[error("device busy")]
    DeviceBusy,

    /// Contract violation. Static messages avoid allocating on the
    /// realtime path.
    #[error("invalid value: {0}")]
    Invalid(Cow<'static, str>),

    #[error("backend unavailable")]
    BackendUnavailable,

    #[error("unrecoverable streaming failure")]
    Streaming,

    #[error("incompatible device: {0}")]
    IncompatibleDevice(String),

    #[error("no such client")]
    NoSuchClient,

    #[error("incompatible backend")]
    IncompatibleBackend,

    #[error("backend disconnected")]
    BackendDisconnected,

    #[error("interrupted; try again")]
    Interrupted,

    #[error("buffer underflow")]
    Underflow,
}

/// How a [`StreamError`] should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad format/rate/layout or an unsupported request. Reconfigure and reopen.
    Configuration,
    /// Device or system temporarily unavailable. Retry.
    Transient,
    /// The stream or backend is unusable. Tear down and rebuild.
    Fatal,
    /// Operations called out of order or with out-of-range arguments.
    ContractViolation,
    /// A missed realtime deadline. Counted, never escalated.
    Xrun,
}

impl StreamError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::IncompatibleDevice(_) | Self::IncompatibleBackend | Self::NoSuchDevice => {
                ErrorClass::Configuration
            }
            Self::DeviceBusy
            | Self::OpeningDevice(_)
            | Self::SystemResources(_)
            | Self::Interrupted
            | Self::NoMem => ErrorClass::Transient,
            Self::Streaming
            | Self::BackendDisconnected
            | Self::BackendUnavailable
            | Self::InitBackend(_)
            | Self::NoSuchClient => ErrorClass::Fatal,
            Self::Invalid(_) => ErrorClass::ContractViolation,
            Self::Underflow => ErrorClass::Xrun,
        }
    }

    /// Whether the only valid response is to destroy the stream or context.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Invalid(message.into())
    }
}
