use crate::models::error::StreamError;
use crate::traits::backend::DeviceList;

/// Notifications delivered by [`Context::flush_events`](crate::Context::flush_events).
///
/// Called on whichever thread pumps events, never on a realtime thread.
pub trait ContextDelegate: Send {
    /// The device set changed. `devices` is the fresh snapshot.
    fn on_devices_change(&mut self, devices: &DeviceList);

    /// The backend went away. Every stream and device handle from this
    /// context is now unusable; create a new context to continue.
    fn on_backend_disconnect(&mut self, error: &StreamError);
}
