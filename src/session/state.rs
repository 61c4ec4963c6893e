use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::PreviewError;
use crate::hal::{CameraDevice, CaptureSession};
use crate::request::CaptureRequestTemplate;
use crate::session::lock::AccessPermit;
use crate::session::stream::StreamHandle;
use crate::types::{CaptureDeviceId, PreviewDimensions, Surface};

/// Observable stage of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SessionPhase {
    Idle,
    Opening,
    Opened,
    Configuring,
    Streaming,
    Closing,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Opening => "opening",
            SessionPhase::Opened => "opened",
            SessionPhase::Configuring => "configuring",
            SessionPhase::Streaming => "streaming",
            SessionPhase::Closing => "closing",
            SessionPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Session state. Handles live only in the variants where they are valid.
#[derive(Default)]
pub(crate) enum SessionState {
    #[default]
    Idle,
    Opening {
        device_id: CaptureDeviceId,
        dimensions: PreviewDimensions,
        /// Held until the open result arrives
        _permit: AccessPermit,
    },
    Opened {
        device: Box<dyn CameraDevice>,
        dimensions: PreviewDimensions,
    },
    Configuring {
        device: Box<dyn CameraDevice>,
        dimensions: PreviewDimensions,
        template: CaptureRequestTemplate,
    },
    Streaming {
        device: Box<dyn CameraDevice>,
        dimensions: PreviewDimensions,
        session: Arc<dyn CaptureSession>,
        stream: StreamHandle,
        /// Availability window the repeating request writes into
        surface: Surface,
    },
    Closing,
    Error {
        error: PreviewError,
    },
}

impl SessionState {
    pub(crate) fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Opening { .. } => SessionPhase::Opening,
            SessionState::Opened { .. } => SessionPhase::Opened,
            SessionState::Configuring { .. } => SessionPhase::Configuring,
            SessionState::Streaming { .. } => SessionPhase::Streaming,
            SessionState::Closing => SessionPhase::Closing,
            SessionState::Error { .. } => SessionPhase::Error,
        }
    }

    pub(crate) fn has_device(&self) -> bool {
        matches!(
            self,
            SessionState::Opened { .. }
                | SessionState::Configuring { .. }
                | SessionState::Streaming { .. }
        )
    }

    pub(crate) fn dimensions(&self) -> Option<PreviewDimensions> {
        match self {
            SessionState::Opening { dimensions, .. }
            | SessionState::Opened { dimensions, .. }
            | SessionState::Configuring { dimensions, .. }
            | SessionState::Streaming { dimensions, .. } => Some(*dimensions),
            _ => None,
        }
    }

    pub(crate) fn error(&self) -> Option<&PreviewError> {
        match self {
            SessionState::Error { error } => Some(error),
            _ => None,
        }
    }

    /// Surface the running repeating request is bound to
    pub(crate) fn streaming_surface(&self) -> Option<Surface> {
        match self {
            SessionState::Streaming { surface, .. } => Some(*surface),
            _ => None,
        }
    }

    /// Stop the stream relay and drop the capture session, keeping the
    /// device. Any state other than `Streaming` is returned unchanged.
    pub(crate) fn stop_stream(self, join_timeout: Duration) -> SessionState {
        match self {
            SessionState::Streaming {
                device,
                dimensions,
                session,
                stream,
                ..
            } => {
                if !stream.stop(join_timeout) {
                    log::warn!("Stream relay did not exit within {:?}", join_timeout);
                }
                drop(session);
                SessionState::Opened { device, dimensions }
            }
            other => other,
        }
    }

    /// Stop the stream relay, drop the capture session and close the device.
    /// Returns whether a device handle was closed.
    pub(crate) fn release(self, join_timeout: Duration) -> bool {
        match self.stop_stream(join_timeout) {
            SessionState::Opened { mut device, .. }
            | SessionState::Configuring { mut device, .. } => {
                device.close();
                true
            }
            _ => false,
        }
    }
}
