//! Device session: the open/configure/stream state machine.

mod configurator;
mod device;
pub(crate) mod events;
mod lock;
mod state;
mod stream;

pub use configurator::StreamConfigurator;
pub use device::{DeviceSession, OpenOutcome};
pub use events::{DeviceNotifier, SessionNotifier};
pub use state::SessionPhase;
pub use stream::{StreamController, StreamHandle};

use crate::errors::PreviewError;

/// Receives user-visible failures, once each. Implementations must not call
/// back into the session.
pub trait FailureSink: Send + Sync {
    fn notify(&self, error: &PreviewError);
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn notify(&self, error: &PreviewError) {
        log::error!("Camera preview failure: {}", error);
    }
}
