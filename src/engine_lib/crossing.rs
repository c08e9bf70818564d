// src/engine_lib/crossing.rs

use log::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossingState {
    #[default]
    Outside,
    Inside,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingEvent {
    Entered,
    Exited,
}

/// Hysteresis classifier over the viewer's signed distance from the anchor plane.
/// Distances inside `[exit_threshold, enter_threshold]` never change the state.
#[derive(Clone, Debug)]
pub struct CrossingDetector {
    state: CrossingState,
    signed_distance: Option<f32>,
    enter_threshold: f32,
    exit_threshold: f32,
}

impl CrossingDetector {
    pub fn new(enter_threshold: f32, exit_threshold: f32) -> Self {
        debug_assert!(exit_threshold < enter_threshold);
        Self {
            state: CrossingState::Outside,
            signed_distance: None,
            enter_threshold,
            exit_threshold,
        }
    }

    pub fn state(&self) -> CrossingState {
        self.state
    }

    /// Last distance fed to `update`, if any since the last reset.
    pub fn signed_distance(&self) -> Option<f32> {
        self.signed_distance
    }

    pub fn update(&mut self, signed_distance: f32) -> Option<CrossingEvent> {
        self.signed_distance = Some(signed_distance);
        match self.state {
            CrossingState::Outside if signed_distance > self.enter_threshold => self.enter(),
            CrossingState::Inside if signed_distance < self.exit_threshold => self.exit(),
            _ => None,
        }
    }

    /// Forces the Inside state. Returns `None` when already inside.
    pub fn enter(&mut self) -> Option<CrossingEvent> {
        if self.state == CrossingState::Inside {
            return None;
        }
        info!("viewer crossed into the portal");
        self.state = CrossingState::Inside;
        Some(CrossingEvent::Entered)
    }

    pub fn exit(&mut self) -> Option<CrossingEvent> {
        if self.state == CrossingState::Outside {
            return None;
        }
        info!("viewer crossed back out of the portal");
        self.state = CrossingState::Outside;
        Some(CrossingEvent::Exited)
    }

    pub fn reset(&mut self) {
        self.state = CrossingState::Outside;
        self.signed_distance = None;
    }
}

impl Default for CrossingDetector {
    fn default() -> Self {
        Self::new(crate::engine_lib::config::ENTER_THRESHOLD, crate::engine_lib::config::EXIT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CrossingState::{Inside, Outside};

    fn run(samples: &[f32]) -> Vec<CrossingState> {
        let mut detector = CrossingDetector::default();
        samples
            .iter()
            .map(|&d| {
                detector.update(d);
                detector.state()
            })
            .collect()
    }

    #[test]
    fn dead_band_does_not_flicker() {
        assert_eq!(run(&[0.30, 0.10, 0.30, -0.05, 0.30]), vec![Inside; 5]);
    }

    #[test]
    fn leaving_requires_passing_exit_threshold() {
        assert_eq!(
            run(&[0.30, 0.10, 0.30, -0.15, 0.30]),
            vec![Inside, Inside, Inside, Outside, Inside]
        );
    }

    #[test]
    fn thresholds_are_strict() {
        assert_eq!(run(&[0.25]), vec![Outside]);
        assert_eq!(run(&[0.26, -0.1]), vec![Inside, Inside]);
    }

    #[test]
    fn events_fire_once_per_crossing() {
        let mut detector = CrossingDetector::default();
        let events: Vec<_> = [-1.0, 0.3, 0.4, 0.5, -0.2, -0.3, 0.3]
            .iter()
            .filter_map(|&d| detector.update(d))
            .collect();
        assert_eq!(events, vec![CrossingEvent::Entered, CrossingEvent::Exited, CrossingEvent::Entered]);
    }

    #[test]
    fn forced_enter_is_idempotent() {
        let mut detector = CrossingDetector::default();
        assert_eq!(detector.enter(), Some(CrossingEvent::Entered));
        assert_eq!(detector.enter(), None);
        assert_eq!(detector.state(), Inside);
    }
}
