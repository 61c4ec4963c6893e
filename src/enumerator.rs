//! Device discovery
//!
//! Picks the capture device to open and the preview size to run it at.

use crate::errors::PreviewError;
use crate::hal::SharedBackend;
use crate::types::{CaptureDeviceId, Facing, OutputTarget, PreviewDimensions};

pub struct DeviceEnumerator {
    backend: SharedBackend,
}

impl DeviceEnumerator {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// First device whose lens faces `required_facing`.
    ///
    /// A device whose characteristics cannot be read is skipped, not fatal.
    pub fn select_device(&self, required_facing: Facing) -> Result<CaptureDeviceId, PreviewError> {
        for id in self.backend.device_ids()? {
            match self.backend.characteristics(&id) {
                Ok(characteristics) if characteristics.facing == required_facing => {
                    log::debug!("Selected camera {} facing {}", id, required_facing);
                    return Ok(id);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Skipping camera {}: {}", id, e),
            }
        }
        Err(PreviewError::DeviceNotFound(required_facing))
    }

    /// First size the device reports for surface-texture output
    pub fn preview_dimensions(&self, id: &CaptureDeviceId) -> Result<PreviewDimensions, PreviewError> {
        let characteristics = self.backend.characteristics(id)?;
        characteristics
            .output_sizes(OutputTarget::SurfaceTexture)
            .first()
            .copied()
            .ok_or_else(|| {
                PreviewError::Unsupported(format!(
                    "camera {} reports no surface texture output sizes",
                    id
                ))
            })
    }

    /// Device and preview size for one open cycle
    pub fn resolve(&self, required_facing: Facing) -> Result<(CaptureDeviceId, PreviewDimensions), PreviewError> {
        let id = self.select_device(required_facing)?;
        let dimensions = self.preview_dimensions(&id)?;
        Ok((id, dimensions))
    }
}
