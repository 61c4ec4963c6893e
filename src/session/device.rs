use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::assert_invariant;
use crate::config::PreviewConfig;
use crate::enumerator::DeviceEnumerator;
use crate::errors::PreviewError;
use crate::hal::{SharedBackend, SharedRenderTarget};
use crate::invariants::{CLOSE_RETURNS_IDLE, OPEN_STARTS_WITHOUT_DEVICE};
use crate::permissions::{PermissionGate, PermissionProvider, PermissionRequest, PermissionStatus};
use crate::session::events::SessionEvent;
use crate::session::lock::{AccessLock, AccessPermit};
use crate::session::state::{SessionPhase, SessionState};
use crate::session::{
    DeviceNotifier, FailureSink, SessionNotifier, StreamConfigurator, StreamController,
};
use crate::types::{CaptureDeviceId, Facing, PreviewDimensions};

/// Result of [`DeviceSession::request_open`]
#[derive(Debug)]
pub enum OpenOutcome {
    /// The open is in flight; the result arrives asynchronously
    Opening {
        generation: u64,
        device_id: CaptureDeviceId,
    },
    /// A device was already held; it was bound to the live render target
    /// again
    Reconfiguring,
    /// Nothing to do, the session is already in this phase
    AlreadyActive(SessionPhase),
    /// Permission is missing; a grant request was issued instead
    PermissionRequested(PermissionRequest),
}

struct Machine {
    state: SessionState,
    generation: u64,
}

struct Shared {
    machine: Mutex<Machine>,
    changed: Condvar,
    access: Arc<AccessLock>,
    events: Sender<SessionEvent>,
    configurator: StreamConfigurator,
    stream: StreamController,
    sink: Arc<dyn FailureSink>,
    join_timeout: Duration,
}

/// Owns the camera device and drives the session state machine.
///
/// Caller-facing operations (`request_open`, `close`) run on the caller's
/// thread. Hardware notifications are queued and applied one at a time on a
/// dedicated callback thread.
pub struct DeviceSession {
    shared: Arc<Shared>,
    backend: SharedBackend,
    enumerator: DeviceEnumerator,
    permissions: PermissionGate,
    required_facing: Facing,
    open_timeout: Duration,
    dispatcher: Option<JoinHandle<()>>,
}

impl DeviceSession {
    pub fn new(
        backend: SharedBackend,
        permissions: Arc<dyn PermissionProvider>,
        target: SharedRenderTarget,
        config: PreviewConfig,
        sink: Arc<dyn FailureSink>,
    ) -> Result<Self, PreviewError> {
        config.validate().map_err(PreviewError::Config)?;

        let (events, inbox) = unbounded();
        let shared = Arc::new(Shared {
            machine: Mutex::new(Machine {
                state: SessionState::Idle,
                generation: 0,
            }),
            changed: Condvar::new(),
            access: AccessLock::new(),
            events,
            configurator: StreamConfigurator::new(target),
            stream: StreamController::new(config.stream.control_mode),
            sink,
            join_timeout: config.join_timeout(),
        });

        let dispatcher = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name("crabpreview-callbacks".to_string())
                .spawn(move || dispatch_loop(shared, inbox))
                .map_err(|e| PreviewError::device_access(format!("spawn failed: {e}")))?
        };

        Ok(Self {
            shared,
            enumerator: DeviceEnumerator::new(backend.clone()),
            backend,
            permissions: PermissionGate::new(permissions),
            required_facing: config.device.required_facing,
            open_timeout: config.open_timeout(),
            dispatcher: Some(dispatcher),
        })
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.observe().state.phase()
    }

    /// Whether a device handle is currently owned
    pub fn has_device(&self) -> bool {
        self.shared.observe().state.has_device()
    }

    /// Counter bumped by every open and close; notifications stamped with an
    /// older value are discarded.
    pub fn generation(&self) -> u64 {
        self.shared.observe().generation
    }

    pub fn preview_dimensions(&self) -> Option<PreviewDimensions> {
        self.shared.observe().state.dimensions()
    }

    /// The failure that put the session into `Error`, if it is there now
    pub fn error(&self) -> Option<PreviewError> {
        self.shared.observe().state.error().cloned()
    }

    /// Block until the session reaches `phase`. Returns `false` on timeout.
    pub fn wait_for_phase(&self, phase: SessionPhase, timeout: Duration) -> bool {
        let machine = self.shared.observe();
        let (machine, _) = self
            .shared
            .changed
            .wait_timeout_while(machine, timeout, |m| m.state.phase() != phase)
            .unwrap_or_else(PoisonError::into_inner);
        machine.state.phase() == phase
    }

    /// Start acquiring the camera.
    ///
    /// Without the capture permission this issues a grant request and leaves
    /// the state untouched; retry once the grant arrives. Enumeration
    /// failures are reported and returned without entering `Error`. With a
    /// device already held, a render target that became available again is
    /// bound to it instead.
    pub fn request_open(&self) -> Result<OpenOutcome, PreviewError> {
        {
            let mut machine = self.shared.lock_machine()?;
            match machine.state.phase() {
                SessionPhase::Idle | SessionPhase::Error => {}
                SessionPhase::Streaming if self.shared.stream_is_current(&machine) => {
                    log::debug!("Open requested while streaming, ignoring");
                    return Ok(OpenOutcome::AlreadyActive(SessionPhase::Streaming));
                }
                SessionPhase::Opened | SessionPhase::Streaming => {
                    let failure = self.shared.rebind(&mut machine);
                    drop(machine);
                    if let Some(e) = failure {
                        self.shared.report(&e);
                        return Err(e);
                    }
                    return Ok(OpenOutcome::Reconfiguring);
                }
                phase => {
                    log::debug!("Open requested while {}, ignoring", phase);
                    return Ok(OpenOutcome::AlreadyActive(phase));
                }
            }
        }

        if self.permissions.status() != PermissionStatus::Granted {
            log::info!("Camera permission not granted, requesting it");
            return Ok(OpenOutcome::PermissionRequested(self.permissions.request()));
        }

        let permit = self.shared.access.acquire(self.open_timeout).map_err(|e| {
            log::warn!("Could not lock camera for opening: {}", e);
            self.shared.report(&e);
            e
        })?;

        let (device_id, dimensions) = self
            .enumerator
            .resolve(self.required_facing)
            .map_err(|e| {
                log::warn!("Camera lookup failed: {}", e);
                self.shared.report(&e);
                e
            })?;

        self.begin_open(permit, device_id, dimensions)
    }

    fn begin_open(
        &self,
        permit: AccessPermit,
        device_id: CaptureDeviceId,
        dimensions: PreviewDimensions,
    ) -> Result<OpenOutcome, PreviewError> {
        let mut machine = self.shared.lock_machine()?;
        let phase = machine.state.phase();
        if !matches!(phase, SessionPhase::Idle | SessionPhase::Error) {
            return Ok(OpenOutcome::AlreadyActive(phase));
        }
        assert_invariant!(
            !machine.state.has_device(),
            OPEN_STARTS_WITHOUT_DEVICE,
            "DeviceSession::request_open"
        );

        machine.generation += 1;
        let generation = machine.generation;
        self.shared.set_state(
            &mut machine,
            SessionState::Opening {
                device_id: device_id.clone(),
                dimensions,
                _permit: permit,
            },
        );

        let notifier = DeviceNotifier::new(generation, self.shared.events.clone());
        if let Err(e) = self.backend.open_device(&device_id, notifier) {
            log::error!("Opening camera {} failed: {}", device_id, e);
            self.shared
                .set_state(&mut machine, SessionState::Error { error: e.clone() });
            drop(machine);
            self.shared.report(&e);
            return Err(e);
        }

        log::info!(
            "Opening camera {} at {} (generation {})",
            device_id,
            dimensions,
            generation
        );
        Ok(OpenOutcome::Opening {
            generation,
            device_id,
        })
    }

    /// Open once the capture permission is available, waiting for an
    /// outstanding grant request if necessary.
    pub async fn open_when_permitted(&self) -> Result<OpenOutcome, PreviewError> {
        let request = match self.request_open()? {
            OpenOutcome::PermissionRequested(request) => request,
            outcome => return Ok(outcome),
        };

        if request.await != PermissionStatus::Granted {
            return Err(PreviewError::PermissionDenied(
                "camera permission was not granted".to_string(),
            ));
        }

        match self.request_open()? {
            OpenOutcome::PermissionRequested(_) => Err(PreviewError::PermissionDenied(
                "camera permission still reported as denied after grant".to_string(),
            )),
            outcome => Ok(outcome),
        }
    }

    /// Tear the session down and return to `Idle`.
    ///
    /// Blocks until the device lock is free, so an open still waiting for its
    /// result is allowed to finish first and its device is closed here. Safe
    /// to call from any phase, including `Idle`.
    pub fn close(&self) -> Result<(), PreviewError> {
        let permit = self.shared.access.acquire_blocking().map_err(|e| {
            log::error!("Interrupted while trying to lock camera closing: {}", e);
            self.shared.report(&e);
            e
        })?;

        let previous = {
            let mut machine = self.shared.lock_machine()?;
            if let SessionState::Idle = machine.state {
                log::debug!("Close requested while idle");
                return Ok(());
            }
            machine.generation += 1;
            let previous = std::mem::replace(&mut machine.state, SessionState::Closing);
            self.shared.changed.notify_all();
            previous
        };

        let phase = previous.phase();
        if previous.release(self.shared.join_timeout) {
            log::info!("Camera device closed (was {})", phase);
        } else {
            log::debug!("Session closed from {} without a device handle", phase);
        }

        let mut machine = self.shared.lock_machine()?;
        self.shared.set_state(&mut machine, SessionState::Idle);
        assert_invariant!(
            !machine.state.has_device() && machine.state.phase() == SessionPhase::Idle,
            CLOSE_RETURNS_IDLE,
            "DeviceSession::close"
        );
        drop(machine);
        drop(permit);
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Error closing camera session in drop: {}", e);
        }
        let _ = self.shared.events.send(SessionEvent::Shutdown);
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

fn dispatch_loop(shared: Arc<Shared>, inbox: Receiver<SessionEvent>) {
    for event in inbox.iter() {
        if let SessionEvent::Shutdown = event {
            break;
        }
        let name = event.name();
        if std::panic::catch_unwind(AssertUnwindSafe(|| shared.apply(event))).is_err() {
            log::error!("Panic while handling {}, notification dropped", name);
        }
    }
    for event in inbox.try_iter() {
        event.discard();
    }
    log::debug!("Callback dispatcher exiting");
}

impl Shared {
    fn lock_machine(&self) -> Result<MutexGuard<'_, Machine>, PreviewError> {
        self.machine
            .lock()
            .map_err(|_| PreviewError::poisoned_lock("session state"))
    }

    /// Read-only access that tolerates poisoning
    fn observe(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, machine: &mut Machine, next: SessionState) {
        log::debug!("Session {} (generation {})", next.phase(), machine.generation);
        machine.state = next;
        self.changed.notify_all();
    }

    fn report(&self, error: &PreviewError) {
        if error.is_user_visible() {
            self.sink.notify(error);
        }
    }

    fn apply(&self, event: SessionEvent) {
        let failure = match self.lock_machine() {
            Ok(mut machine) => self.transition(&mut machine, event),
            Err(e) => {
                event.discard();
                Some(e)
            }
        };
        if let Some(e) = failure {
            self.report(&e);
        }
    }

    /// The single transition function for hardware notifications. Returns a
    /// failure to report once the state lock is released.
    fn transition(&self, machine: &mut Machine, event: SessionEvent) -> Option<PreviewError> {
        let Some(generation) = event.generation() else {
            return None;
        };
        if generation != machine.generation {
            log::warn!(
                "Discarding {} for generation {} (current {})",
                event.name(),
                generation,
                machine.generation
            );
            event.discard();
            return None;
        }

        match (std::mem::take(&mut machine.state), event) {
            (SessionState::Opening { dimensions, .. }, SessionEvent::Opened { device, .. }) => {
                log::info!("Camera {} opened", device.id());
                self.set_state(machine, SessionState::Opened { device, dimensions });
                self.configure(machine)
            }
            (
                state @ (SessionState::Opening { .. }
                | SessionState::Opened { .. }
                | SessionState::Configuring { .. }
                | SessionState::Streaming { .. }),
                event @ (SessionEvent::Disconnected { .. } | SessionEvent::DeviceError { .. }),
            ) => {
                let error = match event {
                    SessionEvent::DeviceError { code, .. } => {
                        PreviewError::device_access(format!("camera device error {code}"))
                    }
                    _ => PreviewError::device_access("camera disconnected"),
                };
                log::warn!("{} while {}", error, state.phase());
                state.release(self.join_timeout);
                self.set_state(machine, SessionState::Error { error: error.clone() });
                Some(error)
            }
            (
                SessionState::Configuring {
                    mut device,
                    dimensions,
                    template,
                },
                SessionEvent::Configured { session, .. },
            ) => {
                let surface = match template.target() {
                    Some(surface) if self.configurator.is_live(surface) => surface,
                    _ => {
                        log::debug!("Render target changed during configuration, configuring again");
                        drop(session);
                        self.set_state(machine, SessionState::Opened { device, dimensions });
                        return self.configure(machine);
                    }
                };

                let notifier = SessionNotifier::new(generation, self.events.clone());
                match self.stream.start(session.clone(), template, notifier) {
                    Ok(stream) => {
                        log::info!("Preview streaming on camera {} at {}", device.id(), dimensions);
                        self.set_state(
                            machine,
                            SessionState::Streaming {
                                device,
                                dimensions,
                                session,
                                stream,
                                surface,
                            },
                        );
                        None
                    }
                    Err(e) => {
                        drop(session);
                        device.close();
                        self.set_state(machine, SessionState::Error { error: e.clone() });
                        Some(e)
                    }
                }
            }
            (SessionState::Configuring { mut device, .. }, SessionEvent::ConfigureFailed { .. }) => {
                device.close();
                let error = PreviewError::device_access("capture session configuration failed");
                log::warn!("{}", error);
                self.set_state(machine, SessionState::Error { error: error.clone() });
                Some(error)
            }
            (state @ SessionState::Streaming { .. }, SessionEvent::StreamFailed { reason, .. }) => {
                state.release(self.join_timeout);
                let error = PreviewError::device_access(format!("repeating request failed: {reason}"));
                self.set_state(machine, SessionState::Error { error: error.clone() });
                Some(error)
            }
            (state, event) => {
                log::warn!("Ignoring {} while {}", event.name(), state.phase());
                machine.state = state;
                event.discard();
                None
            }
        }
    }

    fn stream_is_current(&self, machine: &Machine) -> bool {
        machine
            .state
            .streaming_surface()
            .is_some_and(|surface| self.configurator.is_live(surface))
    }

    /// Move a held device onto the live render target: a stream bound to an
    /// older availability window is stopped, then configuration runs again.
    fn rebind(&self, machine: &mut Machine) -> Option<PreviewError> {
        if machine.state.phase() == SessionPhase::Streaming {
            log::info!("Render target replaced, rebinding preview stream");
            let state = std::mem::take(&mut machine.state).stop_stream(self.join_timeout);
            self.set_state(machine, state);
        }
        self.configure(machine)
    }

    /// `Opened -> Configuring`. An unavailable render target leaves the
    /// session in `Opened` holding the device.
    fn configure(&self, machine: &mut Machine) -> Option<PreviewError> {
        match std::mem::take(&mut machine.state) {
            SessionState::Opened {
                mut device,
                dimensions,
            } => {
                let notifier = SessionNotifier::new(machine.generation, self.events.clone());
                match self
                    .configurator
                    .configure(device.as_ref(), dimensions, notifier)
                {
                    Ok(template) => {
                        self.set_state(
                            machine,
                            SessionState::Configuring {
                                device,
                                dimensions,
                                template,
                            },
                        );
                        None
                    }
                    Err(PreviewError::ResourceUnavailable(reason)) => {
                        log::debug!("Preview configuration deferred: {}", reason);
                        machine.state = SessionState::Opened { device, dimensions };
                        None
                    }
                    Err(e) => {
                        log::warn!("Preview configuration failed: {}", e);
                        device.close();
                        self.set_state(machine, SessionState::Error { error: e.clone() });
                        Some(e)
                    }
                }
            }
            other => {
                machine.state = other;
                None
            }
        }
    }
}
