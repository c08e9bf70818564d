// src/engine_lib/transition.rs

use crate::engine_lib::config::{PortalConfig, SmoothingMode};

/// Compositing mode of the occlusion overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlayMode {
    /// Not rendered at all.
    #[default]
    Hidden,
    /// Alpha-blended at the current opacity.
    Blended,
    /// Drawn fully opaque, no blending.
    Opaque,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransitionTargets {
    pub occlusion_opacity: f32,
    pub clear_alpha: f32,
}

impl TransitionTargets {
    pub const OUTSIDE: TransitionTargets = TransitionTargets { occlusion_opacity: 0.0, clear_alpha: 0.0 };
}

/// First-order smoothing of the overlay opacity and background clear alpha.
#[derive(Clone, Debug)]
pub struct TransitionAnimator {
    targets: TransitionTargets,
    occlusion_opacity: f32,
    clear_alpha: f32,
    overlay_mode: OverlayMode,
    factor: f32,
    mode: SmoothingMode,
    opaque_snap: f32,
    hidden_snap: f32,
}

impl TransitionAnimator {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            targets: TransitionTargets::OUTSIDE,
            occlusion_opacity: 0.0,
            clear_alpha: 0.0,
            overlay_mode: OverlayMode::Hidden,
            factor: config.smoothing_factor,
            mode: config.smoothing_mode,
            opaque_snap: config.opaque_snap_threshold,
            hidden_snap: config.hidden_snap_threshold,
        }
    }

    pub fn set_targets(&mut self, targets: TransitionTargets) {
        self.targets = TransitionTargets {
            occlusion_opacity: targets.occlusion_opacity.clamp(0.0, 1.0),
            clear_alpha: targets.clear_alpha.clamp(0.0, 1.0),
        };
    }

    pub fn targets(&self) -> TransitionTargets {
        self.targets
    }

    pub fn occlusion_opacity(&self) -> f32 {
        self.occlusion_opacity
    }

    pub fn clear_alpha(&self) -> f32 {
        self.clear_alpha
    }

    pub fn overlay_mode(&self) -> OverlayMode {
        self.overlay_mode
    }

    fn blend(&self, dt: f32) -> f32 {
        match self.mode {
            SmoothingMode::PerFrame => self.factor,
            SmoothingMode::TimeScaled { reference_hz } => {
                1.0 - (1.0 - self.factor).powf(dt.max(0.0) * reference_hz)
            }
        }
    }

    /// Advances one rendered frame.
    pub fn step(&mut self, dt: f32) -> OverlayMode {
        let k = self.blend(dt);
        self.occlusion_opacity += (self.targets.occlusion_opacity - self.occlusion_opacity) * k;
        self.clear_alpha += (self.targets.clear_alpha - self.clear_alpha) * k;

        let high_target = self.targets.occlusion_opacity > self.opaque_snap;
        self.overlay_mode = if self.occlusion_opacity > self.opaque_snap && high_target {
            OverlayMode::Opaque
        } else if self.occlusion_opacity <= self.hidden_snap && self.targets.occlusion_opacity == 0.0 {
            OverlayMode::Hidden
        } else {
            OverlayMode::Blended
        };
        self.overlay_mode
    }

    /// Jumps straight to the outside defaults.
    pub fn reset(&mut self) {
        self.targets = TransitionTargets::OUTSIDE;
        self.occlusion_opacity = 0.0;
        self.clear_alpha = 0.0;
        self.overlay_mode = OverlayMode::Hidden;
    }
}
