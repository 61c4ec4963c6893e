use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::errors::PreviewError;
use crate::hal::CaptureSession;
use crate::request::{CaptureRequest, CaptureRequestTemplate};
use crate::session::SessionNotifier;
use crate::types::ControlMode;

enum StreamCommand {
    Submit(CaptureRequest),
}

/// Starts the repeating preview request for a configured session.
pub struct StreamController {
    control_mode: ControlMode,
}

impl StreamController {
    pub fn new(control_mode: ControlMode) -> Self {
        Self { control_mode }
    }

    /// Finalize `template` and submit it as a repeating request from a
    /// relay thread created for this session alone.
    ///
    /// Submission failures come back through `notifier`.
    pub fn start(
        &self,
        session: Arc<dyn CaptureSession>,
        mut template: CaptureRequestTemplate,
        notifier: SessionNotifier,
    ) -> Result<StreamHandle, PreviewError> {
        template.set_control_mode(self.control_mode);
        let request = template.build()?;

        let (commands, inbox) = unbounded();
        let name = format!("crabpreview-stream-{}", notifier.generation());
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || relay_loop(session, inbox, notifier))
            .map_err(|e| PreviewError::device_access(format!("spawn failed: {e}")))?;

        let handle = StreamHandle {
            name,
            commands: Some(commands),
            thread: Some(thread),
        };
        handle.submit(request)?;
        Ok(handle)
    }
}

fn relay_loop(
    session: Arc<dyn CaptureSession>,
    inbox: Receiver<StreamCommand>,
    notifier: SessionNotifier,
) {
    for command in inbox.iter() {
        match command {
            StreamCommand::Submit(request) => {
                if let Err(e) = session.set_repeating_request(&request) {
                    log::warn!("Repeating request rejected: {}", e);
                    notifier.on_stream_failed(e.to_string());
                    break;
                }
                log::debug!(
                    "Repeating request running on surface epoch {}",
                    request.target.epoch
                );
            }
        }
    }
}

/// The relay thread behind a streaming session
pub struct StreamHandle {
    name: String,
    commands: Option<Sender<StreamCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, request: CaptureRequest) -> Result<(), PreviewError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| PreviewError::resource_unavailable("stream relay stopped"))?;
        commands
            .send(StreamCommand::Submit(request))
            .map_err(|_| PreviewError::resource_unavailable("stream relay exited"))
    }

    /// Close the relay inbox and wait up to `join_timeout` for the thread to
    /// exit. Returns `false` if it is still running; it is then detached.
    pub fn stop(mut self, join_timeout: Duration) -> bool {
        self.commands.take();
        let Some(handle) = self.thread.take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                let _ = handle.join();
                return true;
            }
            if start.elapsed() >= join_timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.commands.take();
    }
}
