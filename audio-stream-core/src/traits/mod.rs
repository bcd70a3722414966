pub mod backend;
pub mod context_delegate;
pub mod stream_callbacks;
