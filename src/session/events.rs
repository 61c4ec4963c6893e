use std::sync::Arc;

use crossbeam_channel::{SendError, Sender};

use crate::hal::{CameraDevice, CaptureSession};

/// Notifications from the hardware layer, stamped with the open cycle they
/// belong to.
pub(crate) enum SessionEvent {
    Opened {
        generation: u64,
        device: Box<dyn CameraDevice>,
    },
    Disconnected {
        generation: u64,
    },
    DeviceError {
        generation: u64,
        code: i32,
    },
    Configured {
        generation: u64,
        session: Arc<dyn CaptureSession>,
    },
    ConfigureFailed {
        generation: u64,
    },
    StreamFailed {
        generation: u64,
        reason: String,
    },
    Shutdown,
}

impl SessionEvent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SessionEvent::Opened { .. } => "on_opened",
            SessionEvent::Disconnected { .. } => "on_disconnected",
            SessionEvent::DeviceError { .. } => "on_error",
            SessionEvent::Configured { .. } => "on_configured",
            SessionEvent::ConfigureFailed { .. } => "on_configure_failed",
            SessionEvent::StreamFailed { .. } => "stream_failed",
            SessionEvent::Shutdown => "shutdown",
        }
    }

    pub(crate) fn generation(&self) -> Option<u64> {
        match self {
            SessionEvent::Opened { generation, .. }
            | SessionEvent::Disconnected { generation }
            | SessionEvent::DeviceError { generation, .. }
            | SessionEvent::Configured { generation, .. }
            | SessionEvent::ConfigureFailed { generation }
            | SessionEvent::StreamFailed { generation, .. } => Some(*generation),
            SessionEvent::Shutdown => None,
        }
    }

    /// Drop an event nobody will consume. A device handle carried by it is
    /// closed so the hardware is not left open without an owner.
    pub(crate) fn discard(self) {
        match self {
            SessionEvent::Opened { mut device, generation } => {
                log::warn!(
                    "Closing camera {} opened for stale generation {}",
                    device.id(),
                    generation
                );
                device.close();
            }
            SessionEvent::Configured { generation, .. } => {
                log::debug!("Dropping capture session for stale generation {}", generation);
            }
            _ => {}
        }
    }
}

fn post(events: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(SendError(event)) = events.send(event) {
        log::debug!("Callback dispatcher gone, dropping {}", event.name());
        event.discard();
    }
}

/// Handed to [`CameraBackend::open_device`](crate::hal::CameraBackend::open_device)
/// to report the outcome of an open.
#[derive(Clone)]
pub struct DeviceNotifier {
    generation: u64,
    events: Sender<SessionEvent>,
}

impl DeviceNotifier {
    pub(crate) fn new(generation: u64, events: Sender<SessionEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_opened(&self, device: Box<dyn CameraDevice>) {
        post(
            &self.events,
            SessionEvent::Opened {
                generation: self.generation,
                device,
            },
        );
    }

    pub fn on_disconnected(&self) {
        post(
            &self.events,
            SessionEvent::Disconnected {
                generation: self.generation,
            },
        );
    }

    pub fn on_error(&self, code: i32) {
        post(
            &self.events,
            SessionEvent::DeviceError {
                generation: self.generation,
                code,
            },
        );
    }
}

/// Handed to [`CameraDevice::create_capture_session`](crate::hal::CameraDevice::create_capture_session)
/// to report the outcome of configuration.
#[derive(Clone)]
pub struct SessionNotifier {
    generation: u64,
    events: Sender<SessionEvent>,
}

impl SessionNotifier {
    pub(crate) fn new(generation: u64, events: Sender<SessionEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_configured(&self, session: Arc<dyn CaptureSession>) {
        post(
            &self.events,
            SessionEvent::Configured {
                generation: self.generation,
                session,
            },
        );
    }

    pub fn on_configure_failed(&self) {
        post(
            &self.events,
            SessionEvent::ConfigureFailed {
                generation: self.generation,
            },
        );
    }

    pub(crate) fn on_stream_failed(&self, reason: String) {
        post(
            &self.events,
            SessionEvent::StreamFailed {
                generation: self.generation,
                reason,
            },
        );
    }
}
