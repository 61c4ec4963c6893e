//! Scripted in-memory hardware
//!
//! Callbacks are delivered from a separate thread, the way a platform camera
//! service delivers them from its own executor. Every device handle is
//! counted so tests can check how many were live at once and whether any
//! was dropped without being closed.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::PreviewError;
use crate::hal::{
    CameraBackend, CameraDevice, CaptureSession, DeviceNotifier, RenderTarget, SessionNotifier,
};
use crate::permissions::{PermissionProvider, PermissionStatus, RequestToken};
use crate::request::{CaptureRequest, CaptureRequestTemplate};
use crate::session::FailureSink;
use crate::types::{
    CaptureDeviceId, DeviceCharacteristics, Facing, OutputTarget, PreviewDimensions,
    RequestTemplate, Surface,
};

/// How the fake answers `open_device`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    /// Deliver `on_opened`
    Succeed,
    /// Return an error synchronously
    Reject,
    /// Deliver `on_error(code)`
    Error(i32),
    /// Deliver `on_disconnected`
    Disconnect,
    /// Hold the notifier until the test releases it
    Defer,
}

/// How the fake answers `create_capture_session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureBehavior {
    Succeed,
    /// Deliver `on_configure_failed`
    Fail,
    /// Return an error synchronously
    Reject,
    Defer,
}

struct Camera {
    id: CaptureDeviceId,
    characteristics: Result<DeviceCharacteristics, String>,
}

struct BackendState {
    cameras: Mutex<Vec<Camera>>,
    device_ids_error: Mutex<Option<String>>,
    open_behavior: Mutex<OpenBehavior>,
    configure_behavior: Mutex<ConfigureBehavior>,
    pending_opens: Mutex<Vec<(CaptureDeviceId, DeviceNotifier)>>,
    pending_configures: Mutex<Vec<SessionNotifier>>,
    last_open: Mutex<Option<DeviceNotifier>>,
    session: Arc<FakeSession>,
    open_requests: AtomicUsize,
    sessions_requested: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    closed: AtomicUsize,
    leaked: AtomicUsize,
}

fn on_executor(task: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .name("fake-camera-executor".to_string())
        .spawn(task)
        .expect("spawn fake executor");
}

/// Camera service double
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// `cam0` facing front and `cam1` facing back, both offering
    /// 1920x1080 then 1280x720 for surface textures.
    pub fn new() -> Self {
        let backend = Self::empty();
        for (id, facing) in [("cam0", Facing::Front), ("cam1", Facing::Back)] {
            backend.add_camera(
                id,
                DeviceCharacteristics::new(facing).with_output_sizes(
                    OutputTarget::SurfaceTexture,
                    [(1920, 1080), (1280, 720)],
                ),
            );
        }
        backend
    }

    pub fn empty() -> Self {
        Self {
            state: Arc::new(BackendState {
                cameras: Mutex::new(Vec::new()),
                device_ids_error: Mutex::new(None),
                open_behavior: Mutex::new(OpenBehavior::Succeed),
                configure_behavior: Mutex::new(ConfigureBehavior::Succeed),
                pending_opens: Mutex::new(Vec::new()),
                pending_configures: Mutex::new(Vec::new()),
                last_open: Mutex::new(None),
                session: Arc::new(FakeSession::new()),
                open_requests: AtomicUsize::new(0),
                sessions_requested: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                leaked: AtomicUsize::new(0),
            }),
        }
    }

    pub fn add_camera(&self, id: &str, characteristics: DeviceCharacteristics) {
        self.state.cameras.lock().expect("lock poisoned").push(Camera {
            id: CaptureDeviceId::new(id),
            characteristics: Ok(characteristics),
        });
    }

    /// A camera whose characteristics query fails
    pub fn add_broken_camera(&self, id: &str, reason: &str) {
        self.state.cameras.lock().expect("lock poisoned").push(Camera {
            id: CaptureDeviceId::new(id),
            characteristics: Err(reason.to_string()),
        });
    }

    pub fn fail_device_ids(&self, reason: &str) {
        *self.state.device_ids_error.lock().expect("lock poisoned") = Some(reason.to_string());
    }

    pub fn set_open_behavior(&self, behavior: OpenBehavior) {
        *self.state.open_behavior.lock().expect("lock poisoned") = behavior;
    }

    pub fn set_configure_behavior(&self, behavior: ConfigureBehavior) {
        *self.state.configure_behavior.lock().expect("lock poisoned") = behavior;
    }

    /// A device handle outside of any open flow, counted like the others
    pub fn make_device(&self, id: CaptureDeviceId) -> FakeDevice {
        FakeDevice::new(self.state.clone(), id)
    }

    /// Deliver `on_opened` for the oldest deferred open
    pub fn release_pending_open(&self) -> bool {
        let pending = {
            let mut opens = self.state.pending_opens.lock().expect("lock poisoned");
            if opens.is_empty() {
                None
            } else {
                Some(opens.remove(0))
            }
        };
        match pending {
            Some((id, notifier)) => {
                notifier.on_opened(Box::new(self.make_device(id)));
                true
            }
            None => false,
        }
    }

    /// Deliver `on_error` for the oldest deferred open
    pub fn fail_pending_open(&self, code: i32) -> bool {
        let mut opens = self.state.pending_opens.lock().expect("lock poisoned");
        if opens.is_empty() {
            return false;
        }
        let (_, notifier) = opens.remove(0);
        drop(opens);
        notifier.on_error(code);
        true
    }

    /// Deliver `on_configured` for the oldest deferred configuration
    pub fn release_pending_configure(&self) -> bool {
        let mut configures = self.state.pending_configures.lock().expect("lock poisoned");
        if configures.is_empty() {
            return false;
        }
        let notifier = configures.remove(0);
        drop(configures);
        notifier.on_configured(self.state.session.clone());
        true
    }

    /// Deliver `on_disconnected` through the notifier of the latest open
    pub fn disconnect(&self) -> bool {
        let notifier = self.state.last_open.lock().expect("lock poisoned").clone();
        match notifier {
            Some(notifier) => {
                notifier.on_disconnected();
                true
            }
            None => false,
        }
    }

    pub fn pending_opens(&self) -> usize {
        self.state.pending_opens.lock().expect("lock poisoned").len()
    }

    pub fn pending_configures(&self) -> usize {
        self.state.pending_configures.lock().expect("lock poisoned").len()
    }

    /// The session handed out by every successful configuration
    pub fn session(&self) -> Arc<FakeSession> {
        self.state.session.clone()
    }

    pub fn open_requests(&self) -> usize {
        self.state.open_requests.load(Ordering::SeqCst)
    }

    pub fn sessions_requested(&self) -> usize {
        self.state.sessions_requested.load(Ordering::SeqCst)
    }

    pub fn live_devices(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn max_live_devices(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }

    pub fn closed_devices(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Handles dropped without `close`
    pub fn leaked_devices(&self) -> usize {
        self.state.leaked.load(Ordering::SeqCst)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for FakeBackend {
    fn device_ids(&self) -> Result<Vec<CaptureDeviceId>, PreviewError> {
        if let Some(reason) = self.state.device_ids_error.lock().expect("lock poisoned").clone() {
            return Err(PreviewError::DeviceAccess(reason));
        }
        Ok(self
            .state
            .cameras
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|camera| camera.id.clone())
            .collect())
    }

    fn characteristics(
        &self,
        id: &CaptureDeviceId,
    ) -> Result<DeviceCharacteristics, PreviewError> {
        let cameras = self.state.cameras.lock().expect("lock poisoned");
        let camera = cameras
            .iter()
            .find(|camera| &camera.id == id)
            .ok_or_else(|| PreviewError::DeviceAccess(format!("unknown camera {id}")))?;
        camera
            .characteristics
            .clone()
            .map_err(PreviewError::DeviceAccess)
    }

    fn open_device(
        &self,
        id: &CaptureDeviceId,
        notifier: DeviceNotifier,
    ) -> Result<(), PreviewError> {
        self.state.open_requests.fetch_add(1, Ordering::SeqCst);
        self.characteristics(id)?;
        *self.state.last_open.lock().expect("lock poisoned") = Some(notifier.clone());

        let behavior = *self.state.open_behavior.lock().expect("lock poisoned");
        match behavior {
            OpenBehavior::Succeed => {
                let state = self.state.clone();
                let id = id.clone();
                on_executor(move || notifier.on_opened(Box::new(FakeDevice::new(state, id))));
            }
            OpenBehavior::Reject => {
                return Err(PreviewError::DeviceAccess(format!("camera {id} in use")));
            }
            OpenBehavior::Error(code) => on_executor(move || notifier.on_error(code)),
            OpenBehavior::Disconnect => on_executor(move || notifier.on_disconnected()),
            OpenBehavior::Defer => self
                .state
                .pending_opens
                .lock()
                .expect("lock poisoned")
                .push((id.clone(), notifier)),
        }
        Ok(())
    }
}

/// Device handle double
pub struct FakeDevice {
    id: CaptureDeviceId,
    state: Arc<BackendState>,
    closed: bool,
}

impl FakeDevice {
    fn new(state: Arc<BackendState>, id: CaptureDeviceId) -> Self {
        let live = state.live.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_live.fetch_max(live, Ordering::SeqCst);
        Self {
            id,
            state,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), PreviewError> {
        if self.closed {
            return Err(PreviewError::DeviceAccess(format!("camera {} closed", self.id)));
        }
        Ok(())
    }
}

impl CameraDevice for FakeDevice {
    fn id(&self) -> &CaptureDeviceId {
        &self.id
    }

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> Result<CaptureRequestTemplate, PreviewError> {
        self.ensure_open()?;
        Ok(CaptureRequestTemplate::new(template))
    }

    fn create_capture_session(
        &self,
        outputs: &[Surface],
        notifier: SessionNotifier,
    ) -> Result<(), PreviewError> {
        self.ensure_open()?;
        if outputs.is_empty() {
            return Err(PreviewError::InvalidRequest("no outputs".to_string()));
        }
        self.state.sessions_requested.fetch_add(1, Ordering::SeqCst);

        let behavior = *self.state.configure_behavior.lock().expect("lock poisoned");
        match behavior {
            ConfigureBehavior::Succeed => {
                let session: Arc<dyn CaptureSession> = self.state.session.clone();
                on_executor(move || notifier.on_configured(session));
            }
            ConfigureBehavior::Fail => on_executor(move || notifier.on_configure_failed()),
            ConfigureBehavior::Reject => {
                return Err(PreviewError::DeviceAccess(
                    "stream configuration rejected".to_string(),
                ));
            }
            ConfigureBehavior::Defer => self
                .state
                .pending_configures
                .lock()
                .expect("lock poisoned")
                .push(notifier),
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        if !self.closed {
            self.state.leaked.fetch_add(1, Ordering::SeqCst);
            self.state.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Capture session double recording what was submitted and from where
#[derive(Default)]
pub struct FakeSession {
    submitted: Mutex<Vec<CaptureRequest>>,
    threads: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<CaptureRequest> {
        self.submitted.lock().expect("lock poisoned").clone()
    }

    /// Names of the threads that called `set_repeating_request`
    pub fn submit_threads(&self) -> Vec<String> {
        self.threads.lock().expect("lock poisoned").clone()
    }
}

impl CaptureSession for FakeSession {
    fn set_repeating_request(&self, request: &CaptureRequest) -> Result<(), PreviewError> {
        let thread = std::thread::current()
            .name()
            .unwrap_or("<unnamed>")
            .to_string();
        self.threads.lock().expect("lock poisoned").push(thread);

        if self.fail.load(Ordering::SeqCst) {
            return Err(PreviewError::DeviceAccess(
                "session rejected repeating request".to_string(),
            ));
        }
        self.submitted
            .lock()
            .expect("lock poisoned")
            .push(request.clone());
        Ok(())
    }
}

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Render target double
pub struct FakeRenderTarget {
    id: u64,
    epochs: AtomicU64,
    window: Mutex<Option<u64>>,
    buffer_size: Mutex<Option<PreviewDimensions>>,
}

impl FakeRenderTarget {
    /// A target that is not available yet
    pub fn new() -> Self {
        Self {
            id: NEXT_TARGET_ID.fetch_add(1, Ordering::SeqCst),
            epochs: AtomicU64::new(0),
            window: Mutex::new(None),
            buffer_size: Mutex::new(None),
        }
    }

    /// Open a new availability window
    pub fn make_available(&self) -> Surface {
        let epoch = self.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        *self.window.lock().expect("lock poisoned") = Some(epoch);
        Surface {
            target_id: self.id,
            epoch,
        }
    }

    pub fn destroy(&self) {
        *self.window.lock().expect("lock poisoned") = None;
    }

    pub fn surface_token(&self) -> Option<Surface> {
        self.window
            .lock()
            .expect("lock poisoned")
            .map(|epoch| Surface {
                target_id: self.id,
                epoch,
            })
    }

    /// Last size set through `set_default_buffer_size`
    pub fn buffer_size(&self) -> Option<PreviewDimensions> {
        *self.buffer_size.lock().expect("lock poisoned")
    }
}

impl Default for FakeRenderTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTarget for FakeRenderTarget {
    fn surface(&self) -> Option<Surface> {
        self.surface_token()
    }

    fn set_default_buffer_size(&self, dimensions: PreviewDimensions) {
        *self.buffer_size.lock().expect("lock poisoned") = Some(dimensions);
    }
}

/// Permission provider double
pub struct FakePermissions {
    status: Mutex<PermissionStatus>,
    requests: Mutex<Vec<(String, RequestToken)>>,
}

impl FakePermissions {
    pub fn granted() -> Self {
        Self::with_status(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::with_status(PermissionStatus::Denied)
    }

    fn with_status(status: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, status: PermissionStatus) {
        *self.status.lock().expect("lock poisoned") = status;
    }

    pub fn requests(&self) -> Vec<(String, RequestToken)> {
        self.requests.lock().expect("lock poisoned").clone()
    }

    pub fn last_token(&self) -> Option<RequestToken> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .last()
            .map(|(_, token)| *token)
    }
}

impl PermissionProvider for FakePermissions {
    fn current_status(&self) -> PermissionStatus {
        *self.status.lock().expect("lock poisoned")
    }

    fn request(&self, permission: &str, token: RequestToken) {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push((permission.to_string(), token));
    }
}

/// Failure sink that keeps what it was told
#[derive(Default)]
pub struct RecordingSink {
    failures: Mutex<Vec<PreviewError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<PreviewError> {
        self.failures.lock().expect("lock poisoned").clone()
    }
}

impl FailureSink for RecordingSink {
    fn notify(&self, error: &PreviewError) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .push(error.clone());
    }
}
