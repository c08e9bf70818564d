// src/engine_lib/runtime.rs

use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::engine_lib::anchor::{AnchorTransform, CommitOutcome};
use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::crossing::CrossingState;
use crate::engine_lib::error::{PortalError, PortalResult};
use crate::engine_lib::events::{PortalEvent, PortalListener};
use crate::engine_lib::geometry::{Pose, Ray};
use crate::engine_lib::portal::{FrameReport, PortalCore};
use crate::engine_lib::session::{CancellationToken, SessionManager, SessionState};
use crate::engine_lib::tracking::{AnchorTracker, MarkerTracker, PreciseTracker, TrackingMode};
use crate::engine_lib::platform::XrPlatform;
use crate::rendering_lib::compositor::CompositorContent;

/// Which callback delivered a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSource {
    /// Generic window/animation callback.
    Animation,
    /// The immersive session's presentation callback.
    Presentation,
}

/// Which callback currently owns the update step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameLoop {
    #[default]
    Animation,
    Presentation,
    Stopped,
}

#[derive(Debug, Default)]
struct Status {
    frame_loop: FrameLoop,
    hit_test_supported: Option<bool>,
    last_error: Option<PortalError>,
    disposed: bool,
}

/// Detached handle that cancels the runtime from outside the frame loop,
/// e.g. when the owning view is torn down while `start` is pending.
#[derive(Clone, Debug)]
pub struct DisposeHandle {
    token: CancellationToken,
}

impl DisposeHandle {
    pub fn dispose(&self) {
        self.token.cancel();
    }
}

/// Ties the session, the chosen tracker and the portal state machine together.
pub struct PortalRuntime<P: XrPlatform> {
    session: SessionManager<P>,
    core: Mutex<PortalCore>,
    status: Mutex<Status>,
    mount: CancellationToken,
}

impl<P: XrPlatform> PortalRuntime<P> {
    pub fn new(platform: P, config: PortalConfig, content: CompositorContent, width: u32, height: u32) -> Self {
        let mount = CancellationToken::new();
        let session = SessionManager::with_mount(platform, config.session_features, mount.clone());
        Self {
            session,
            core: Mutex::new(PortalCore::new(config, content, width, height)),
            status: Mutex::new(Status::default()),
            mount,
        }
    }

    fn core(&self) -> MutexGuard<'_, PortalCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn session(&self) -> &SessionManager<P> {
        &self.session
    }

    pub fn with_core<R>(&self, f: impl FnOnce(&PortalCore) -> R) -> R {
        f(&self.core())
    }

    pub fn with_core_mut<R>(&self, f: impl FnOnce(&mut PortalCore) -> R) -> R {
        f(&mut self.core())
    }

    pub fn frame_loop(&self) -> FrameLoop {
        self.status().frame_loop
    }

    pub fn tracking_mode(&self) -> Option<TrackingMode> {
        self.core().tracking_mode()
    }

    pub fn crossing_state(&self) -> CrossingState {
        self.core().crossing_state()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn last_error(&self) -> Option<PortalError> {
        self.status().last_error.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.status().disposed
    }

    /// Whether the UI should offer to start a session.
    pub fn start_enabled(&self) -> bool {
        !self.is_disposed() && !self.mount.is_cancelled() && self.session.state() == SessionState::Idle
    }

    pub fn dispose_handle(&self) -> DisposeHandle {
        DisposeHandle { token: self.mount.clone() }
    }

    fn set_frame_loop(&self, frame_loop: FrameLoop) {
        let mut status = self.status();
        if status.disposed {
            return;
        }
        if status.frame_loop != frame_loop {
            debug!("frame loop {:?} -> {:?}", status.frame_loop, frame_loop);
            status.frame_loop = frame_loop;
        }
    }

    fn record_error(&self, error: &PortalError) {
        self.status().last_error = Some(error.clone());
    }

    /// Bails out of an async continuation once the mount has been cancelled.
    fn check_mount(&self) -> PortalResult<()> {
        if self.mount.is_cancelled() {
            self.dispose();
            return Err(PortalError::Disposed);
        }
        Ok(())
    }

    async fn probe_hit_test(&self) -> PortalResult<bool> {
        if let Some(supported) = self.status().hit_test_supported {
            return Ok(supported);
        }
        let supported = self.session.platform().supports_hit_test().await;
        self.check_mount()?;
        info!("hit-test capability probe: {}", supported);
        let mut status = self.status();
        status.hit_test_supported = Some(supported);
        if !supported {
            status.last_error = Some(PortalError::CapabilityUnsupported("surface hit-testing".into()));
        }
        Ok(supported)
    }

    /// Picks the tracker on first use, then starts the session (precise
    /// tracking) or the marker detector (fallback).
    pub async fn start(&self) -> PortalResult<()> {
        self.check_mount()?;
        if self.is_disposed() {
            return Err(PortalError::Disposed);
        }
        let mode = match self.tracking_mode() {
            Some(mode) => mode,
            None => {
                if self.probe_hit_test().await? {
                    TrackingMode::PreciseHitTest
                } else {
                    TrackingMode::MarkerFallback
                }
            }
        };
        match mode {
            TrackingMode::PreciseHitTest => self.start_precise().await,
            TrackingMode::MarkerFallback => self.start_fallback().await,
        }
    }

    /// The precise tracker is installed only once a session with a hit-test
    /// source is up. A missing hit-test capability or source switches the
    /// mount to marker fallback for good.
    async fn start_precise(&self) -> PortalResult<()> {
        match self.session.start().await {
            Ok(()) => {
                self.check_mount()?;
                {
                    let mut core = self.core();
                    if !core.has_tracker() {
                        core.install_tracker(Box::new(PreciseTracker::new()))?;
                    }
                }
                self.status().last_error = None;
                self.set_frame_loop(FrameLoop::Presentation);
                Ok(())
            }
            Err(e) => {
                self.check_mount()?;
                self.record_error(&e);
                match e {
                    PortalError::CapabilityUnsupported(_) | PortalError::ResourceAcquisitionFailed(_)
                        if !self.core().has_tracker() =>
                    {
                        warn!("{}; switching to marker tracking", e);
                        self.status().hit_test_supported = Some(false);
                        self.start_fallback().await
                    }
                    _ => Err(e),
                }
            }
        }
    }

    async fn start_fallback(&self) -> PortalResult<()> {
        if self.core().has_tracker() {
            self.set_frame_loop(FrameLoop::Animation);
            return Ok(());
        }
        // Announced before the detector load so the camera preview can let go of the camera.
        self.core().announce_mode(TrackingMode::MarkerFallback);

        let loaded = self.session.platform().load_marker_detector().await;
        self.check_mount()?;
        let tracker: Box<dyn AnchorTracker> = match loaded {
            Ok(detector) => Box::new(MarkerTracker::with_detector(Box::new(detector))),
            Err(e) => {
                let err = PortalError::ResourceAcquisitionFailed(e.0);
                warn!("{}; using the static default pose", err);
                self.record_error(&err);
                let config = self.core().config().clone();
                Box::new(MarkerTracker::with_static_pose(AnchorTransform::new(
                    config.default_anchor_position,
                    config.default_anchor_yaw,
                )))
            }
        };
        self.core().install_tracker(tracker)?;
        self.set_frame_loop(FrameLoop::Animation);
        Ok(())
    }

    /// Runs the update step if `source` owns the frame loop.
    pub fn on_frame(&self, source: FrameSource, viewer: &Pose, dt: f32) -> Option<FrameReport> {
        if self.mount.is_cancelled() {
            self.dispose();
            return None;
        }
        match (self.frame_loop(), source) {
            (FrameLoop::Presentation, FrameSource::Presentation) | (FrameLoop::Animation, FrameSource::Animation) => {}
            _ => return None,
        }
        if self.session.poll_ended() {
            self.after_session_end();
            return None;
        }

        let mut core = self.core();
        let report = self.session.with_hit_test(|hit_test| core.frame(viewer, dt, hit_test));
        if core.take_hit_test_release() {
            self.session.release_hit_test();
        }
        Some(report)
    }

    pub fn select(&self, viewer: &Pose) -> CommitOutcome {
        if self.is_disposed() {
            return CommitOutcome::Ignored;
        }
        let mut core = self.core();
        let outcome = core.select(viewer);
        if core.take_hit_test_release() {
            self.session.release_hit_test();
        }
        outcome
    }

    pub fn pick(&self, ray: &Ray) -> bool {
        if self.is_disposed() {
            return false;
        }
        let mut core = self.core();
        let picked = core.pick(ray);
        if core.take_hit_test_release() {
            self.session.release_hit_test();
        }
        picked
    }

    /// Pending async work: re-acquires the hit-test source after the viewer
    /// has walked back out of the portal.
    pub async fn service(&self) -> PortalResult<()> {
        if self.is_disposed() {
            return Ok(());
        }
        if self.crossing_state() != CrossingState::Outside || !self.session.needs_hit_test() {
            return Ok(());
        }
        match self.session.reacquire_hit_test().await {
            Ok(()) => Ok(()),
            Err(PortalError::Cancelled) => Ok(()),
            Err(e) => {
                warn!("{}", e);
                self.record_error(&e);
                Err(e)
            }
        }
    }

    fn after_session_end(&self) {
        self.core().reset();
        self.set_frame_loop(FrameLoop::Animation);
    }

    pub fn end_session(&self) {
        self.session.end();
        self.after_session_end();
    }

    /// Tears everything down. Safe from any exit path, any number of times.
    pub fn dispose(&self) {
        {
            let mut status = self.status();
            if status.disposed {
                return;
            }
            status.disposed = true;
            status.frame_loop = FrameLoop::Stopped;
        }
        info!("disposing portal runtime");
        self.mount.cancel();
        self.session.dispose();
        let mut core = self.core();
        core.reset();
        core.compositor_mut().release();
    }

    /// Returns false when ignored because the session owns the output surface.
    pub fn on_resize(&self, width: u32, height: u32) -> bool {
        if self.frame_loop() != FrameLoop::Animation {
            return false;
        }
        self.core().compositor_mut().resize(width, height);
        true
    }

    pub fn drain_events(&self) -> Vec<PortalEvent> {
        self.core().drain_events()
    }

    pub fn dispatch_events(&self, listener: &mut dyn PortalListener) {
        for event in self.drain_events() {
            listener.dispatch(event);
        }
    }
}
