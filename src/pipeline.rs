//! Host-facing preview pipeline
//!
//! Wires the surface watcher to the device session and exposes the hooks a
//! host application calls from its lifecycle, surface and permission
//! callbacks.

use std::sync::Arc;

use crate::config::PreviewConfig;
use crate::errors::PreviewError;
use crate::hal::{SharedBackend, SharedRenderTarget};
use crate::permissions::{PermissionProvider, PermissionStatus, RequestToken};
use crate::session::{DeviceSession, FailureSink, OpenOutcome, SessionPhase};
use crate::types::PreviewDimensions;
use crate::watcher::{SurfaceAction, SurfaceReadinessWatcher};

pub struct PreviewPipeline {
    session: DeviceSession,
    watcher: SurfaceReadinessWatcher,
}

impl PreviewPipeline {
    pub fn new(
        backend: SharedBackend,
        permissions: Arc<dyn PermissionProvider>,
        target: SharedRenderTarget,
        config: PreviewConfig,
        sink: Arc<dyn FailureSink>,
    ) -> Result<Self, PreviewError> {
        Ok(Self {
            session: DeviceSession::new(backend, permissions, target, config, sink)?,
            watcher: SurfaceReadinessWatcher::new(),
        })
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    /// Arm the surface watcher, opening right away if the surface is live.
    pub fn on_resume(&self) -> Result<Option<OpenOutcome>, PreviewError> {
        log::info!("Preview resumed");
        self.act(self.watcher.arm())
    }

    /// Disarm the watcher and close the camera before returning.
    pub fn on_pause(&self) -> Result<(), PreviewError> {
        log::info!("Preview paused");
        self.watcher.disarm();
        self.session.close()
    }

    pub fn on_surface_available(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Option<OpenOutcome>, PreviewError> {
        self.act(
            self.watcher
                .on_available(PreviewDimensions::new(width, height)),
        )
    }

    pub fn on_surface_size_changed(&self, width: u32, height: u32) {
        self.watcher
            .on_size_changed(PreviewDimensions::new(width, height));
    }

    /// Returns whether the host may release the surface's backing resource.
    pub fn on_surface_destroyed(&self) -> bool {
        self.watcher.on_destroyed()
    }

    /// Route a grant result from the host. A grant retries the open when
    /// the watcher is armed and the surface is live.
    pub fn on_permission_result(
        &self,
        token: RequestToken,
        status: PermissionStatus,
    ) -> Result<Option<OpenOutcome>, PreviewError> {
        if !self.session.permissions().deliver(token, status) {
            return Ok(None);
        }
        if status != PermissionStatus::Granted {
            log::warn!("Camera permission refused, preview stays closed");
            return Ok(None);
        }
        if self.watcher.is_armed() && self.watcher.dimensions().is_some() {
            return self.session.request_open().map(Some);
        }
        Ok(None)
    }

    fn act(&self, action: SurfaceAction) -> Result<Option<OpenOutcome>, PreviewError> {
        match action {
            SurfaceAction::Open => self.session.request_open().map(Some),
            SurfaceAction::Ignore => Ok(None),
        }
    }
}
