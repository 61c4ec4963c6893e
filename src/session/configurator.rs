use crate::errors::PreviewError;
use crate::hal::{CameraDevice, SharedRenderTarget};
use crate::request::CaptureRequestTemplate;
use crate::session::SessionNotifier;
use crate::types::{PreviewDimensions, RequestTemplate, Surface};

/// Binds an opened device to the render target.
pub struct StreamConfigurator {
    target: SharedRenderTarget,
}

impl StreamConfigurator {
    pub fn new(target: SharedRenderTarget) -> Self {
        Self { target }
    }

    /// Size the target's buffers, build a preview request bound to it and ask
    /// the device for a capture session writing into it.
    ///
    /// Fails with `ResourceUnavailable` when the target is not currently
    /// available; nothing is touched on the device in that case.
    pub fn configure(
        &self,
        device: &dyn CameraDevice,
        dimensions: PreviewDimensions,
        notifier: SessionNotifier,
    ) -> Result<CaptureRequestTemplate, PreviewError> {
        let surface = self.target.surface().ok_or_else(|| {
            PreviewError::resource_unavailable("render target is not available")
        })?;

        self.target.set_default_buffer_size(dimensions);

        let mut template = device.create_capture_request(RequestTemplate::Preview)?;
        template.add_target(surface);

        device.create_capture_session(&[surface], notifier)?;

        log::debug!(
            "Configuring capture session on camera {} at {} (surface epoch {})",
            device.id(),
            dimensions,
            surface.epoch
        );
        Ok(template)
    }

    /// Whether `template` still targets the live availability window.
    pub fn is_current(&self, template: &CaptureRequestTemplate) -> bool {
        template.target().is_some_and(|bound| self.is_live(bound))
    }

    pub fn is_live(&self, surface: Surface) -> bool {
        self.target.surface() == Some(surface)
    }
}
