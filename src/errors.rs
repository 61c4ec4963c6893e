use std::time::Duration;

use crate::types::Facing;

/// Coarse classification used to decide how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Enumeration, characteristics, open or configure failed in the hardware layer
    DeviceAccess,
    /// Capture permission is not granted
    PermissionDenied,
    /// Target surface gone or handle absent when an operation ran
    ResourceUnavailable,
    /// Exclusive-access lock could not be trusted any more
    LockInterrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreviewError {
    #[error("Device access error: {0}")]
    DeviceAccess(String),
    #[error("No capture device facing {0}")]
    DeviceNotFound(Facing),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("Lock interrupted: {0}")]
    LockInterrupted(String),
    #[error("Timed out after {0:?} waiting for the device lock")]
    LockTimeout(Duration),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PreviewError {
    pub fn device_access(message: impl Into<String>) -> Self {
        PreviewError::DeviceAccess(message.into())
    }

    pub fn resource_unavailable(message: impl Into<String>) -> Self {
        PreviewError::ResourceUnavailable(message.into())
    }

    pub fn poisoned_lock(what: &str) -> Self {
        PreviewError::LockInterrupted(format!("{what} poisoned by a panicking thread"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PreviewError::DeviceAccess(_)
            | PreviewError::DeviceNotFound(_)
            | PreviewError::Unsupported(_)
            | PreviewError::LockTimeout(_)
            | PreviewError::InvalidRequest(_)
            | PreviewError::Config(_) => ErrorKind::DeviceAccess,
            PreviewError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            PreviewError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            PreviewError::LockInterrupted(_) => ErrorKind::LockInterrupted,
        }
    }

    /// Whether the host should show this failure to the user.
    ///
    /// Resource-unavailable aborts are benign and stay silent. Permission
    /// denial is handled by the grant flow rather than a failure notice.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeviceAccess | ErrorKind::LockInterrupted
        )
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::LockInterrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PreviewError::DeviceNotFound(Facing::Back).kind(),
            ErrorKind::DeviceAccess
        );
        assert_eq!(
            PreviewError::LockTimeout(Duration::from_millis(10)).kind(),
            ErrorKind::DeviceAccess
        );
        assert_eq!(
            PreviewError::resource_unavailable("gone").kind(),
            ErrorKind::ResourceUnavailable
        );
    }

    #[test]
    fn test_visibility() {
        assert!(PreviewError::device_access("open failed").is_user_visible());
        assert!(!PreviewError::resource_unavailable("no surface").is_user_visible());
        assert!(!PreviewError::PermissionDenied("camera".into()).is_user_visible());
        assert!(PreviewError::poisoned_lock("state").is_fatal());
    }

    #[test]
    fn test_display() {
        let error = PreviewError::DeviceNotFound(Facing::Back);
        assert_eq!(error.to_string(), "No capture device facing back");
    }
}
