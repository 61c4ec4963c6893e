//! Capture permission gate
//!
//! The host platform owns the grant UI. The gate reads the current grant
//! state, fires a request when it is missing, and hands out one-shot futures
//! that resolve when the host routes the result back in.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use uuid::Uuid;

/// Permission identifier passed to the host when requesting access
pub const CAMERA_PERMISSION: &str = "camera";

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied or not yet asked
    Denied,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
        }
    }
}

/// Correlates a grant request with the result the host delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(Uuid);

impl RequestToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Platform side of the permission flow
pub trait PermissionProvider: Send + Sync {
    fn current_status(&self) -> PermissionStatus;

    /// Show the grant UI. The result must be routed back through
    /// [`PermissionGate::deliver`] with the same token.
    fn request(&self, permission: &str, token: RequestToken);
}

/// Resolves with the host's answer to a grant request.
///
/// Resolves to `Denied` if the gate is dropped before an answer arrives.
pub struct PermissionRequest {
    token: RequestToken,
    receiver: oneshot::Receiver<PermissionStatus>,
}

impl PermissionRequest {
    pub fn token(&self) -> RequestToken {
        self.token
    }
}

impl std::fmt::Debug for PermissionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRequest")
            .field("token", &self.token)
            .finish()
    }
}

impl Future for PermissionRequest {
    type Output = PermissionStatus;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(PermissionStatus::Denied))
    }
}

struct PendingGrant {
    token: RequestToken,
    waiters: Vec<oneshot::Sender<PermissionStatus>>,
}

pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    pending: Mutex<Option<PendingGrant>>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            pending: Mutex::new(None),
        }
    }

    pub fn status(&self) -> PermissionStatus {
        self.provider.current_status()
    }

    /// Ask the host for the capture permission.
    ///
    /// While a request is outstanding, further calls join it instead of
    /// showing the grant UI again.
    pub fn request(&self) -> PermissionRequest {
        let (tx, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(grant) = pending.as_mut() {
            log::debug!("Joining outstanding permission request {}", grant.token);
            grant.waiters.push(tx);
            return PermissionRequest {
                token: grant.token,
                receiver,
            };
        }

        let token = RequestToken::new();
        *pending = Some(PendingGrant {
            token,
            waiters: vec![tx],
        });
        drop(pending);

        log::info!("Requesting {} permission ({})", CAMERA_PERMISSION, token);
        self.provider.request(CAMERA_PERMISSION, token);
        PermissionRequest { token, receiver }
    }

    /// Route the host's answer back in. Returns `false` for an unknown or
    /// already answered token.
    pub fn deliver(&self, token: RequestToken, status: PermissionStatus) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.take() {
            Some(grant) if grant.token == token => {
                drop(pending);
                log::info!("Permission request {} answered: {}", token, status);
                for waiter in grant.waiters {
                    let _ = waiter.send(status);
                }
                true
            }
            other => {
                *pending = other;
                log::warn!("Ignoring permission result for unknown request {}", token);
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
