// src/engine_lib/tracking.rs

use glam::Mat4;
use log::debug;

use crate::engine_lib::anchor::{AnchorTransform, CommitOutcome, PortalAnchor};
use crate::engine_lib::crossing::CrossingState;
use crate::engine_lib::geometry::Pose;
use crate::engine_lib::placement::{PlacementState, PlacementTracker, ReticleUpdate};
use crate::engine_lib::platform::{HitTestSource, MarkerDetector};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingMode {
    PreciseHitTest,
    MarkerFallback,
}

/// What a tracker reports for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedAnchor {
    pub anchor: Option<AnchorTransform>,
    pub anchor_visible: bool,
    pub reticle: ReticleUpdate,
}

impl TrackedAnchor {
    pub const NONE: TrackedAnchor = TrackedAnchor {
        anchor: None,
        anchor_visible: false,
        reticle: ReticleUpdate::Hidden,
    };
}

/// Source of the portal's anchor transform, chosen once per mount.
pub trait AnchorTracker {
    fn mode(&self) -> TrackingMode;

    fn track(&mut self, crossing: CrossingState, hit_test: Option<&mut dyn HitTestSource>) -> TrackedAnchor;

    /// Handles a select input from a viewer at `viewer`.
    fn commit(&mut self, viewer: &Pose, crossing: CrossingState) -> CommitOutcome;

    /// Called after the crossing state changed.
    fn on_crossing(&mut self, _state: CrossingState) {}

    fn placement(&self) -> Option<&PlacementState> {
        None
    }

    /// Back to pre-placement defaults (session end).
    fn reset(&mut self);
}

/// Hit-test driven placement with an explicit lock step.
#[derive(Debug, Default)]
pub struct PreciseTracker {
    placement: PlacementTracker,
    anchor: PortalAnchor,
}

impl PreciseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placement_tracker(&self) -> &PlacementTracker {
        &self.placement
    }
}

impl AnchorTracker for PreciseTracker {
    fn mode(&self) -> TrackingMode {
        TrackingMode::PreciseHitTest
    }

    fn track(&mut self, crossing: CrossingState, hit_test: Option<&mut dyn HitTestSource>) -> TrackedAnchor {
        let reticle = self.placement.step(crossing, hit_test);
        let anchor = self.anchor.locked().copied();
        TrackedAnchor {
            anchor,
            anchor_visible: anchor.is_some() && crossing == CrossingState::Outside,
            reticle,
        }
    }

    fn commit(&mut self, viewer: &Pose, crossing: CrossingState) -> CommitOutcome {
        let outcome = self.anchor.commit(self.placement.state(), crossing, viewer.forward());
        if let CommitOutcome::Locked(_) = outcome {
            self.placement.lock();
        }
        outcome
    }

    fn on_crossing(&mut self, state: CrossingState) {
        if state == CrossingState::Inside {
            self.placement.clear();
        }
    }

    fn placement(&self) -> Option<&PlacementState> {
        Some(self.placement.state())
    }

    fn reset(&mut self) {
        self.placement.reset();
        self.anchor.reset();
    }
}

enum MarkerSource {
    Detector(Box<dyn MarkerDetector>),
    Static(AnchorTransform),
}

/// Anchor driven continuously by a marker detector, or pinned to a static
/// default pose when the detector could not be loaded. There is no lock step.
pub struct MarkerTracker {
    source: MarkerSource,
    last_seen: Option<AnchorTransform>,
}

impl MarkerTracker {
    pub fn with_detector(detector: Box<dyn MarkerDetector>) -> Self {
        Self { source: MarkerSource::Detector(detector), last_seen: None }
    }

    pub fn with_static_pose(anchor: AnchorTransform) -> Self {
        Self { source: MarkerSource::Static(anchor), last_seen: Some(anchor) }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, MarkerSource::Static(_))
    }

    fn poll(&mut self) -> Option<AnchorTransform> {
        match &mut self.source {
            MarkerSource::Static(anchor) => Some(*anchor),
            MarkerSource::Detector(detector) => detector
                .poll()
                .map(|m: Mat4| AnchorTransform::from_tracked_pose(&Pose::from_matrix(&m))),
        }
    }
}

impl AnchorTracker for MarkerTracker {
    fn mode(&self) -> TrackingMode {
        TrackingMode::MarkerFallback
    }

    fn track(&mut self, crossing: CrossingState, _hit_test: Option<&mut dyn HitTestSource>) -> TrackedAnchor {
        let detected = self.poll();
        if detected.is_some() {
            self.last_seen = detected;
        }
        TrackedAnchor {
            anchor: detected,
            anchor_visible: detected.is_some() && crossing == CrossingState::Outside,
            reticle: ReticleUpdate::Hidden,
        }
    }

    fn commit(&mut self, _viewer: &Pose, crossing: CrossingState) -> CommitOutcome {
        if crossing == CrossingState::Inside && self.last_seen.is_some() {
            CommitOutcome::Enter
        } else {
            debug!("select ignored: marker tracking has no lock step");
            CommitOutcome::Ignored
        }
    }

    fn reset(&mut self) {
        if let MarkerSource::Detector(_) = self.source {
            self.last_seen = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_lib::placement::tests::ScriptedHits;
    use glam::{Quat, Vec3};
    use std::collections::VecDeque;

    struct ScriptedMarker(VecDeque<Option<Mat4>>);

    impl MarkerDetector for ScriptedMarker {
        fn poll(&mut self) -> Option<Mat4> {
            self.0.pop_front().flatten()
        }
    }

    #[test]
    fn precise_tracker_locks_and_stops_querying() {
        let hits = vec![vec![Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0))]; 3];
        let mut source = ScriptedHits::new(hits);
        let mut tracker = PreciseTracker::new();
        let frame = tracker.track(CrossingState::Outside, Some(&mut source));
        assert!(matches!(frame.reticle, ReticleUpdate::Visible(_)));
        assert!(frame.anchor.is_none());

        let viewer = Pose::IDENTITY;
        assert!(matches!(tracker.commit(&viewer, CrossingState::Outside), CommitOutcome::Locked(_)));
        assert!(tracker.placement().unwrap().locked);
        assert!(!tracker.placement().unwrap().has_valid_placement);

        let frame = tracker.track(CrossingState::Outside, Some(&mut source));
        assert_eq!(frame.reticle, ReticleUpdate::Hidden);
        assert!(frame.anchor_visible);
        assert_eq!(source.calls, 1);
    }

    #[test]
    fn marker_anchor_follows_detections() {
        let pose = Mat4::from_rotation_translation(Quat::from_rotation_y(0.3), Vec3::new(0.1, 0.0, -1.5));
        let mut tracker = MarkerTracker::with_detector(Box::new(ScriptedMarker(
            vec![None, Some(pose), None].into(),
        )));
        assert_eq!(tracker.track(CrossingState::Outside, None), TrackedAnchor::NONE);
        let seen = tracker.track(CrossingState::Outside, None);
        assert!(seen.anchor_visible);
        assert!((seen.anchor.unwrap().yaw - 0.3).abs() < 1e-4);
        assert!(!tracker.track(CrossingState::Outside, None).anchor_visible);
        assert_eq!(tracker.commit(&Pose::IDENTITY, CrossingState::Outside), CommitOutcome::Ignored);
    }

    #[test]
    fn static_pose_is_always_visible() {
        let mut tracker = MarkerTracker::with_static_pose(AnchorTransform::new(Vec3::new(0.0, -0.2, -3.0), 0.0));
        assert!(tracker.is_static());
        for _ in 0..3 {
            assert!(tracker.track(CrossingState::Outside, None).anchor_visible);
        }
        tracker.reset();
        assert!(tracker.track(CrossingState::Outside, None).anchor.is_some());
    }
}
