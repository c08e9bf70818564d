// src/engine_lib/placement.rs

use log::debug;

use crate::engine_lib::crossing::CrossingState;
use crate::engine_lib::geometry::Pose;
use crate::engine_lib::platform::HitTestSource;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlacementState {
    pub reticle_pose: Option<Pose>,
    pub has_valid_placement: bool,
    pub locked: bool,
}

/// Outcome of one tracking step, used by the compositor to place the reticle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReticleUpdate {
    Visible(Pose),
    Hidden,
}

#[derive(Debug, Default)]
pub struct PlacementTracker {
    state: PlacementState,
    queries: u64,
}

impl PlacementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    /// Number of hit-test queries issued since creation or the last reset.
    pub fn query_count(&self) -> u64 {
        self.queries
    }

    pub fn is_suspended(&self, crossing: CrossingState) -> bool {
        self.state.locked || crossing == CrossingState::Inside
    }

    /// Runs the per-frame placement step. The source is not queried at all
    /// while suspended.
    pub fn step(
        &mut self,
        crossing: CrossingState,
        source: Option<&mut dyn HitTestSource>,
    ) -> ReticleUpdate {
        if self.is_suspended(crossing) {
            self.state.has_valid_placement = false;
            return ReticleUpdate::Hidden;
        }
        let Some(source) = source else {
            self.state.has_valid_placement = false;
            return ReticleUpdate::Hidden;
        };

        self.queries += 1;
        let results = source.results();
        match results.first() {
            Some(first) => {
                let pose = Pose::from_matrix(first);
                self.state.reticle_pose = Some(pose);
                self.state.has_valid_placement = true;
                ReticleUpdate::Visible(pose)
            }
            None => {
                self.state.has_valid_placement = false;
                ReticleUpdate::Hidden
            }
        }
    }

    /// Marks the placement as committed. The reticle pose is kept for reference,
    /// but no further placement is valid.
    pub fn lock(&mut self) {
        self.state.locked = true;
        self.state.has_valid_placement = false;
    }

    /// Drops the reticle and any valid placement, e.g. once the viewer is inside.
    pub fn clear(&mut self) {
        debug!("placement tracking cleared");
        self.state.reticle_pose = None;
        self.state.has_valid_placement = false;
    }

    pub fn reset(&mut self) {
        self.state = PlacementState::default();
        self.queries = 0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::VecDeque;

    /// Hit-test source replaying a scripted list of per-frame result counts.
    pub(crate) struct ScriptedHits {
        pub frames: VecDeque<Vec<Mat4>>,
        pub calls: usize,
    }

    impl ScriptedHits {
        pub(crate) fn new(frames: Vec<Vec<Mat4>>) -> Self {
            Self { frames: frames.into(), calls: 0 }
        }
    }

    impl HitTestSource for ScriptedHits {
        fn results(&mut self) -> Vec<Mat4> {
            self.calls += 1;
            self.frames.pop_front().unwrap_or_default()
        }
        fn cancel(&mut self) {}
    }

    fn hit(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn first_result_becomes_reticle() {
        let mut source = ScriptedHits::new(vec![vec![hit(1.0, 0.0, -2.0), hit(5.0, 0.0, -5.0)]]);
        let mut tracker = PlacementTracker::new();
        let update = tracker.step(CrossingState::Outside, Some(&mut source));
        match update {
            ReticleUpdate::Visible(pose) => assert_eq!(pose.position, Vec3::new(1.0, 0.0, -2.0)),
            ReticleUpdate::Hidden => panic!("reticle should be visible"),
        }
        assert!(tracker.state().has_valid_placement);
    }

    #[test]
    fn empty_frame_clears_valid_placement() {
        let mut source = ScriptedHits::new(vec![vec![hit(0.0, 0.0, -1.0)], vec![]]);
        let mut tracker = PlacementTracker::new();
        tracker.step(CrossingState::Outside, Some(&mut source));
        assert!(tracker.state().has_valid_placement);
        assert_eq!(tracker.step(CrossingState::Outside, Some(&mut source)), ReticleUpdate::Hidden);
        assert!(!tracker.state().has_valid_placement);
    }

    #[test]
    fn suspended_tracking_never_queries() {
        let mut source = ScriptedHits::new(vec![vec![hit(0.0, 0.0, -1.0)]; 4]);
        let mut tracker = PlacementTracker::new();
        assert_eq!(tracker.step(CrossingState::Inside, Some(&mut source)), ReticleUpdate::Hidden);
        tracker.lock();
        assert_eq!(tracker.step(CrossingState::Outside, Some(&mut source)), ReticleUpdate::Hidden);
        assert_eq!(source.calls, 0);
        assert_eq!(tracker.query_count(), 0);
        assert!(!tracker.state().has_valid_placement);
    }

    #[test]
    fn valid_placement_tracks_most_recent_query() {
        let mut rng = StdRng::seed_from_u64(0x9047);
        for _ in 0..64 {
            let frames: Vec<Vec<Mat4>> = (0..rng.gen_range(1..40))
                .map(|_| (0..rng.gen_range(0..3)).map(|i| hit(i as f32, 0.0, -1.0)).collect())
                .collect();
            let expected: Vec<bool> = frames.iter().map(|f| !f.is_empty()).collect();
            let mut source = ScriptedHits::new(frames);
            let mut tracker = PlacementTracker::new();
            for want in expected {
                tracker.step(CrossingState::Outside, Some(&mut source));
                assert_eq!(tracker.state().has_valid_placement, want);
            }
        }
    }
}
