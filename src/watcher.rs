//! Render target readiness
//!
//! Tracks the availability windows of the render target and decides when
//! the open sequence should start. Events are recorded even while the
//! watcher is disarmed so that arming on resume can act on a surface that is
//! already live.
//!
//! Size changes are recorded but do not restart the pipeline; the preview
//! keeps the size chosen when the device was opened.

use std::sync::{Mutex, PoisonError};

use crate::types::PreviewDimensions;

/// What the caller should do after a surface event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    Open,
    Ignore,
}

#[derive(Debug, Default)]
struct WatchState {
    armed: bool,
    /// Surface size while an availability window is open
    available: Option<PreviewDimensions>,
    /// Whether the current window already triggered an open
    fired: bool,
}

impl WatchState {
    fn trigger(&mut self) -> SurfaceAction {
        if self.armed && self.available.is_some() && !self.fired {
            self.fired = true;
            SurfaceAction::Open
        } else {
            SurfaceAction::Ignore
        }
    }
}

#[derive(Debug, Default)]
pub struct SurfaceReadinessWatcher {
    state: Mutex<WatchState>,
}

impl SurfaceReadinessWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start reacting to availability. Fires immediately if a window is
    /// already open and has not triggered yet.
    pub fn arm(&self) -> SurfaceAction {
        let mut state = self.state();
        state.armed = true;
        state.trigger()
    }

    /// Stop reacting. The next [`arm`](Self::arm) may fire again for the
    /// same window.
    pub fn disarm(&self) {
        let mut state = self.state();
        state.armed = false;
        state.fired = false;
    }

    pub fn on_available(&self, dimensions: PreviewDimensions) -> SurfaceAction {
        log::debug!("Surface available at {}", dimensions);
        let mut state = self.state();
        state.available = Some(dimensions);
        state.trigger()
    }

    pub fn on_size_changed(&self, dimensions: PreviewDimensions) {
        log::debug!("Surface size changed to {}", dimensions);
        let mut state = self.state();
        if state.available.is_some() {
            state.available = Some(dimensions);
        }
    }

    /// Close the availability window and re-arm the trigger for the next
    /// one. Always allows the host to release the surface.
    pub fn on_destroyed(&self) -> bool {
        log::debug!("Surface destroyed");
        let mut state = self.state();
        state.available = None;
        state.fired = false;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.state().armed
    }

    /// Size of the live window, if any
    pub fn dimensions(&self) -> Option<PreviewDimensions> {
        self.state().available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD: PreviewDimensions = PreviewDimensions::new(1280, 720);

    #[test]
    fn test_fires_once_per_window() {
        let watcher = SurfaceReadinessWatcher::new();
        assert_eq!(watcher.arm(), SurfaceAction::Ignore);
        assert_eq!(watcher.on_available(HD), SurfaceAction::Open);
        assert_eq!(watcher.on_available(HD), SurfaceAction::Ignore);

        assert!(watcher.on_destroyed());
        assert_eq!(watcher.dimensions(), None);
        assert_eq!(watcher.on_available(HD), SurfaceAction::Open);
    }

    #[test]
    fn test_disarmed_watcher_records_but_does_not_fire() {
        let watcher = SurfaceReadinessWatcher::new();
        assert_eq!(watcher.on_available(HD), SurfaceAction::Ignore);
        assert_eq!(watcher.dimensions(), Some(HD));
        assert_eq!(watcher.arm(), SurfaceAction::Open);
        assert_eq!(watcher.arm(), SurfaceAction::Ignore);
    }

    #[test]
    fn test_pause_resume_refires_for_live_window() {
        let watcher = SurfaceReadinessWatcher::new();
        watcher.arm();
        assert_eq!(watcher.on_available(HD), SurfaceAction::Open);
        watcher.disarm();
        assert!(!watcher.is_armed());
        assert_eq!(watcher.arm(), SurfaceAction::Open);
    }

    #[test]
    fn test_size_change_does_not_fire() {
        let watcher = SurfaceReadinessWatcher::new();
        watcher.arm();
        watcher.on_available(HD);
        watcher.on_size_changed(PreviewDimensions::new(640, 480));
        assert_eq!(watcher.dimensions(), Some(PreviewDimensions::new(640, 480)));
        assert_eq!(watcher.on_available(HD), SurfaceAction::Ignore);
    }
}
