//! Capture request builder and the immutable request it produces.

use crate::errors::PreviewError;
use crate::types::{ControlMode, RequestTemplate, Surface};

/// Mutable capture parameters bound to one render target.
///
/// Consumed by [`CaptureRequestTemplate::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequestTemplate {
    template: RequestTemplate,
    target: Option<Surface>,
    control_mode: Option<ControlMode>,
}

impl CaptureRequestTemplate {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            target: None,
            control_mode: None,
        }
    }

    pub fn template(&self) -> RequestTemplate {
        self.template
    }

    /// Bind the request to `surface`. A template outputs to exactly one
    /// target; binding again replaces the previous one.
    pub fn add_target(&mut self, surface: Surface) -> &mut Self {
        if let Some(previous) = self.target.replace(surface) {
            log::debug!(
                "Rebinding capture request from surface epoch {} to {}",
                previous.epoch,
                surface.epoch
            );
        }
        self
    }

    pub fn target(&self) -> Option<Surface> {
        self.target
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) -> &mut Self {
        self.control_mode = Some(mode);
        self
    }

    pub fn build(self) -> Result<CaptureRequest, PreviewError> {
        let target = self.target.ok_or_else(|| {
            PreviewError::InvalidRequest("capture request has no output target".to_string())
        })?;
        Ok(CaptureRequest {
            template: self.template,
            target,
            control_mode: self.control_mode.unwrap_or(ControlMode::Auto),
        })
    }
}

/// Immutable request submitted to a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub target: Surface,
    pub control_mode: ControlMode,
}
