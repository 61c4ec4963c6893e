//! Hardware abstraction layer
//!
//! Platform camera stacks plug in behind these traits. Every asynchronous
//! result is reported through a [`DeviceNotifier`] or [`SessionNotifier`],
//! which may be invoked from any thread, including from inside the call
//! that received it.

use std::sync::Arc;

use crate::errors::PreviewError;
use crate::request::{CaptureRequest, CaptureRequestTemplate};
use crate::types::{
    CaptureDeviceId, DeviceCharacteristics, PreviewDimensions, RequestTemplate, Surface,
};

pub use crate::session::{DeviceNotifier, SessionNotifier};

/// Entry point into the platform camera service
pub trait CameraBackend: Send + Sync {
    /// Ids of every capture device currently known to the platform
    fn device_ids(&self) -> Result<Vec<CaptureDeviceId>, PreviewError>;

    fn characteristics(&self, id: &CaptureDeviceId)
        -> Result<DeviceCharacteristics, PreviewError>;

    /// Start opening `id`. The outcome arrives later through `notifier`.
    ///
    /// An `Err` here means the request was rejected outright and no
    /// notification will follow.
    fn open_device(&self, id: &CaptureDeviceId, notifier: DeviceNotifier)
        -> Result<(), PreviewError>;
}

/// An opened device. Dropping it without calling [`CameraDevice::close`] leaks
/// the hardware on most platforms.
pub trait CameraDevice: Send {
    fn id(&self) -> &CaptureDeviceId;

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> Result<CaptureRequestTemplate, PreviewError>;

    /// Start configuring a capture session writing into `outputs`. The
    /// outcome arrives later through `notifier`.
    fn create_capture_session(
        &self,
        outputs: &[Surface],
        notifier: SessionNotifier,
    ) -> Result<(), PreviewError>;

    /// Close the device, invalidating every session built from it
    fn close(&mut self);
}

/// A configured capture session. Invalid once its device is closed.
pub trait CaptureSession: Send + Sync {
    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), PreviewError>;
}

/// The drawable surface owned by the UI layer
pub trait RenderTarget: Send + Sync {
    /// Token for the current availability window, `None` while unavailable
    fn surface(&self) -> Option<Surface>;

    fn set_default_buffer_size(&self, dimensions: PreviewDimensions);
}

pub type SharedBackend = Arc<dyn CameraBackend>;
pub type SharedRenderTarget = Arc<dyn RenderTarget>;
