//! Shared fixtures for the session integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use crabpreview::testing::{
    fast_config, FakeBackend, FakePermissions, FakeRenderTarget, RecordingSink,
};
use crabpreview::{DeviceSession, PreviewConfig, PreviewPipeline};

pub const WAIT: Duration = Duration::from_secs(3);

/// Fakes wired the same way for every test
pub struct Harness {
    pub backend: FakeBackend,
    pub permissions: Arc<FakePermissions>,
    pub target: Arc<FakeRenderTarget>,
    pub sink: Arc<RecordingSink>,
    pub config: PreviewConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_permissions(FakePermissions::granted())
    }

    pub fn with_permissions(permissions: FakePermissions) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            backend: FakeBackend::new(),
            permissions: Arc::new(permissions),
            target: Arc::new(FakeRenderTarget::new()),
            sink: Arc::new(RecordingSink::new()),
            config: fast_config(),
        }
    }

    pub fn session(&self) -> DeviceSession {
        DeviceSession::new(
            Arc::new(self.backend.clone()),
            self.permissions.clone(),
            self.target.clone(),
            self.config.clone(),
            self.sink.clone(),
        )
        .expect("session should start")
    }

    pub fn pipeline(&self) -> PreviewPipeline {
        PreviewPipeline::new(
            Arc::new(self.backend.clone()),
            self.permissions.clone(),
            self.target.clone(),
            self.config.clone(),
            self.sink.clone(),
        )
        .expect("pipeline should start")
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
