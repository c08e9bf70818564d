// src/engine_lib/portal.rs
//
// Per-frame portal state machine: tracking, commit, crossing and the
// transition into the interior scene.

use std::collections::VecDeque;

use log::{debug, info};

use crate::engine_lib::anchor::{AnchorTransform, CommitOutcome};
use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::crossing::{CrossingDetector, CrossingEvent, CrossingState};
use crate::engine_lib::error::{PortalError, PortalResult};
use crate::engine_lib::events::PortalEvent;
use crate::engine_lib::geometry::{Pose, Ray};
use crate::engine_lib::placement::{PlacementState, ReticleUpdate};
use crate::engine_lib::platform::HitTestSource;
use crate::engine_lib::tracking::{AnchorTracker, TrackedAnchor, TrackingMode};
use crate::engine_lib::transition::{OverlayMode, TransitionAnimator, TransitionTargets};
use crate::rendering_lib::compositor::{CompositorContent, SceneCompositor};

/// Summary of one `PortalCore::frame` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub crossing: CrossingState,
    pub signed_distance: Option<f32>,
    pub event: Option<CrossingEvent>,
    pub overlay: OverlayMode,
    /// The tracker would query a hit-test source this frame if one were held.
    pub wants_hit_test: bool,
}

pub struct PortalCore {
    config: PortalConfig,
    tracker: Option<Box<dyn AnchorTracker>>,
    announced_mode: Option<TrackingMode>,
    crossing: CrossingDetector,
    transition: TransitionAnimator,
    compositor: SceneCompositor,
    anchor: Option<AnchorTransform>,
    anchor_visible: bool,
    events: VecDeque<PortalEvent>,
    release_hit_test: bool,
}

impl PortalCore {
    pub fn new(config: PortalConfig, content: CompositorContent, width: u32, height: u32) -> Self {
        Self {
            crossing: CrossingDetector::new(config.enter_threshold, config.exit_threshold),
            transition: TransitionAnimator::new(&config),
            compositor: SceneCompositor::new(content, width, height),
            config,
            tracker: None,
            announced_mode: None,
            anchor: None,
            anchor_visible: false,
            events: VecDeque::new(),
            release_hit_test: false,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn compositor(&self) -> &SceneCompositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut SceneCompositor {
        &mut self.compositor
    }

    pub fn transition(&self) -> &TransitionAnimator {
        &self.transition
    }

    pub fn crossing_state(&self) -> CrossingState {
        self.crossing.state()
    }

    pub fn signed_distance(&self) -> Option<f32> {
        self.crossing.signed_distance()
    }

    pub fn anchor(&self) -> Option<AnchorTransform> {
        self.anchor
    }

    pub fn tracking_mode(&self) -> Option<TrackingMode> {
        self.tracker.as_ref().map(|t| t.mode()).or(self.announced_mode)
    }

    pub fn placement(&self) -> Option<&PlacementState> {
        self.tracker.as_ref().and_then(|t| t.placement())
    }

    /// Queues a mode notification unless this mode was already announced.
    pub fn announce_mode(&mut self, mode: TrackingMode) {
        if self.announced_mode == Some(mode) {
            return;
        }
        info!("tracking mode: {:?}", mode);
        self.announced_mode = Some(mode);
        self.events.push_back(PortalEvent::TrackingModeChanged(mode));
    }

    /// Selects the anchor source for this mount. Only one tracker may be installed.
    pub fn install_tracker(&mut self, tracker: Box<dyn AnchorTracker>) -> PortalResult<()> {
        if self.tracker.is_some() {
            return Err(PortalError::TrackerAlreadySelected);
        }
        self.announce_mode(tracker.mode());
        self.tracker = Some(tracker);
        Ok(())
    }

    pub fn has_tracker(&self) -> bool {
        self.tracker.is_some()
    }

    /// Set once after entering the portal while a hit-test source was in use.
    pub fn take_hit_test_release(&mut self) -> bool {
        std::mem::take(&mut self.release_hit_test)
    }

    pub fn drain_events(&mut self) -> Vec<PortalEvent> {
        self.events.drain(..).collect()
    }

    /// One update step for a displayed frame.
    pub fn frame(&mut self, viewer: &Pose, dt: f32, hit_test: Option<&mut dyn HitTestSource>) -> FrameReport {
        let state = self.crossing.state();
        let tracked = match self.tracker.as_mut() {
            Some(tracker) => tracker.track(state, hit_test),
            None => TrackedAnchor::NONE,
        };
        self.compositor.update_reticle(tracked.reticle);
        if tracked.anchor.is_some() {
            self.anchor = tracked.anchor;
        }
        self.anchor_visible = tracked.anchor_visible;
        self.compositor.place_anchor(self.anchor, self.anchor_visible);

        let mut event = None;
        if let Some(anchor) = self.anchor {
            let distance = anchor.signed_distance(viewer.position);
            event = self.crossing.update(distance);
            match event {
                Some(CrossingEvent::Entered) => self.on_enter(),
                Some(CrossingEvent::Exited) => self.on_exit(),
                None => {}
            }
        }

        let overlay = self.transition.step(dt);
        self.compositor.apply_transition(&self.transition);
        self.compositor.advance(dt);

        FrameReport {
            crossing: self.crossing.state(),
            signed_distance: self.crossing.signed_distance(),
            event,
            overlay,
            wants_hit_test: self.wants_hit_test(),
        }
    }

    pub fn wants_hit_test(&self) -> bool {
        self.crossing.state() == CrossingState::Outside
            && self.placement().map_or(false, |p| !p.locked)
    }

    /// Handles a select input.
    pub fn select(&mut self, viewer: &Pose) -> CommitOutcome {
        let state = self.crossing.state();
        let Some(tracker) = self.tracker.as_mut() else {
            return CommitOutcome::Ignored;
        };
        let outcome = tracker.commit(viewer, state);
        match outcome {
            CommitOutcome::Locked(anchor) => {
                info!("portal locked at {:?}, yaw {:.3}", anchor.position, anchor.yaw);
                self.anchor = Some(anchor);
                self.anchor_visible = true;
                self.compositor.update_reticle(ReticleUpdate::Hidden);
                self.compositor.place_anchor(Some(anchor), true);
            }
            CommitOutcome::Enter => self.enter(),
            CommitOutcome::Ignored => debug!("select ignored"),
        }
        outcome
    }

    /// Ray-pick against the visible portal surface; a hit enters the portal.
    pub fn pick(&mut self, ray: &Ray) -> bool {
        let Some(anchor) = self.anchor.filter(|_| self.anchor_visible) else {
            return false;
        };
        if self.crossing.state() == CrossingState::Inside {
            return false;
        }
        let size = self.config.portal_size;
        let transform = SceneCompositor::portal_surface_transform(&anchor, size);
        if ray.intersect_rect(&transform, size * 0.5).is_none() {
            return false;
        }
        debug!("portal surface picked");
        self.enter();
        true
    }

    /// Forces the Inside state. No-op when already inside.
    pub fn enter(&mut self) {
        if self.crossing.enter().is_some() {
            self.on_enter();
        }
    }

    pub fn exit(&mut self) {
        if self.crossing.exit().is_some() {
            self.on_exit();
        }
    }

    fn on_enter(&mut self) {
        self.compositor.apply_crossing(CrossingState::Inside);
        self.transition.set_targets(TransitionTargets {
            occlusion_opacity: self.config.inside_occlusion_opacity,
            clear_alpha: self.config.inside_clear_alpha,
        });
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.on_crossing(CrossingState::Inside);
            self.release_hit_test = tracker.mode() == TrackingMode::PreciseHitTest;
        }
        self.compositor.update_reticle(ReticleUpdate::Hidden);
        self.events.push_back(PortalEvent::EnterPortal);
    }

    fn on_exit(&mut self) {
        self.compositor.apply_crossing(CrossingState::Outside);
        self.transition.set_targets(TransitionTargets::OUTSIDE);
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.on_crossing(CrossingState::Outside);
        }
        self.release_hit_test = false;
        self.events.push_back(PortalEvent::ExitPortal);
    }

    /// Back to pre-placement defaults. The tracker stays selected.
    pub fn reset(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
        self.crossing.reset();
        self.transition.reset();
        self.compositor.reset();
        self.anchor = None;
        self.anchor_visible = false;
        self.release_hit_test = false;
    }
}
