//! CrabPreview: single-camera preview session lifecycle
//!
//! Finds the camera facing the required direction, takes exclusive access to
//! it, binds its output to a render target and keeps a repeating preview
//! request running until the host pauses.
//!
//! The platform camera service, the render target and the permission flow
//! are abstracted behind the traits in [`hal`] and [`permissions`], so the
//! lifecycle runs unchanged against real hardware or the doubles in
//! [`testing`].
//!
//! # Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use crabpreview::{LogSink, PreviewConfig, PreviewPipeline};
//!
//! let pipeline = PreviewPipeline::new(
//!     backend,
//!     permissions,
//!     render_target,
//!     PreviewConfig::load_or_default(),
//!     Arc::new(LogSink),
//! )?;
//!
//! // host lifecycle and surface callbacks
//! pipeline.on_resume()?;
//! pipeline.on_surface_available(1280, 720)?;
//! pipeline.on_pause()?;
//! ```
pub mod config;
pub mod enumerator;
pub mod errors;
pub mod hal;
pub mod invariants;
pub mod permissions;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod testing;
pub mod types;
pub mod watcher;

pub use config::PreviewConfig;
pub use enumerator::DeviceEnumerator;
pub use errors::{ErrorKind, PreviewError};
pub use permissions::{
    PermissionGate, PermissionProvider, PermissionRequest, PermissionStatus, RequestToken,
    CAMERA_PERMISSION,
};
pub use pipeline::PreviewPipeline;
pub use request::{CaptureRequest, CaptureRequestTemplate};
pub use session::{DeviceSession, FailureSink, LogSink, OpenOutcome, SessionPhase};
pub use types::{
    CaptureDeviceId, ControlMode, DeviceCharacteristics, Facing, OutputTarget,
    PreviewDimensions, RequestTemplate, Surface,
};
pub use watcher::{SurfaceAction, SurfaceReadinessWatcher};

/// Initialize logging for the crate
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabpreview=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "crabpreview");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
