// src/engine_lib/events.rs

use log::info;

use crate::engine_lib::tracking::TrackingMode;

/// Notifications for collaborators outside the portal core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortalEvent {
    TrackingModeChanged(TrackingMode),
    EnterPortal,
    ExitPortal,
}

pub trait PortalListener {
    fn tracking_mode_changed(&mut self, _mode: TrackingMode) {}
    fn enter_portal(&mut self) {}
    fn exit_portal(&mut self) {}

    fn dispatch(&mut self, event: PortalEvent) {
        match event {
            PortalEvent::TrackingModeChanged(mode) => self.tracking_mode_changed(mode),
            PortalEvent::EnterPortal => self.enter_portal(),
            PortalEvent::ExitPortal => self.exit_portal(),
        }
    }
}

/// Keeps the raw camera preview running unless the marker detector owns the camera.
#[derive(Debug)]
pub struct CameraPreviewGate {
    enabled: bool,
}

impl CameraPreviewGate {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for CameraPreviewGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalListener for CameraPreviewGate {
    fn tracking_mode_changed(&mut self, mode: TrackingMode) {
        let enabled = mode != TrackingMode::MarkerFallback;
        if enabled != self.enabled {
            info!("camera preview {}", if enabled { "resumed" } else { "suspended" });
        }
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_suspends_for_marker_fallback() {
        let mut gate = CameraPreviewGate::new();
        gate.dispatch(PortalEvent::TrackingModeChanged(TrackingMode::PreciseHitTest));
        assert!(gate.is_enabled());
        gate.dispatch(PortalEvent::TrackingModeChanged(TrackingMode::MarkerFallback));
        assert!(!gate.is_enabled());
        gate.dispatch(PortalEvent::EnterPortal);
        assert!(!gate.is_enabled());
    }
}
