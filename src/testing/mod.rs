//! Testing utilities for CrabPreview
//!
//! In-memory doubles for the camera service, render target and permission
//! flow, so the whole session can be driven without hardware.

pub mod fakes;

pub use fakes::{
    ConfigureBehavior, FakeBackend, FakeDevice, FakePermissions, FakeRenderTarget, FakeSession,
    OpenBehavior, RecordingSink,
};

use crate::config::PreviewConfig;

/// Defaults with short lock and join timeouts for tests
pub fn fast_config() -> PreviewConfig {
    let mut config = PreviewConfig::default();
    config.locking.open_timeout_ms = 500;
    config.stream.join_timeout_ms = 500;
    config
}
