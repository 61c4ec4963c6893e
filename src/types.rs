//! Value types shared by the enumerator, session and hardware layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction a camera lens faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
    External,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
            Facing::External => write!(f, "external"),
        }
    }
}

/// Opaque identifier of a capture device, as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureDeviceId(String);

impl CaptureDeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaptureDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaptureDeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Width/height of the preview buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewDimensions {
    pub width: u32,
    pub height: u32,
}

impl PreviewDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for PreviewDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for PreviewDimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Consumer class a device can produce output sizes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputTarget {
    /// GPU texture backed surface, used for on-screen preview
    SurfaceTexture,
    /// CPU readable buffers
    ImageReader,
}

/// Static description of a device, read before opening it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCharacteristics {
    pub facing: Facing,
    /// Supported output sizes per target kind, in the order the device reports them
    pub output_sizes: HashMap<OutputTarget, Vec<PreviewDimensions>>,
}

impl DeviceCharacteristics {
    pub fn new(facing: Facing) -> Self {
        Self {
            facing,
            output_sizes: HashMap::new(),
        }
    }

    pub fn with_output_sizes(
        mut self,
        target: OutputTarget,
        sizes: impl IntoIterator<Item = (u32, u32)>,
    ) -> Self {
        self.output_sizes
            .insert(target, sizes.into_iter().map(PreviewDimensions::from).collect());
        self
    }

    pub fn output_sizes(&self, target: OutputTarget) -> &[PreviewDimensions] {
        self.output_sizes
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Capture request presets a device can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    Record,
}

/// 3A control mode applied to the repeating request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Off,
    Auto,
    UseSceneMode,
}

/// Token for one availability window of a render target.
///
/// A target hands out a new token every time it becomes available, so a
/// token taken before a destroy never compares equal to one taken after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Surface {
    pub target_id: u64,
    pub epoch: u64,
}
