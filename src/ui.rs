// src/ui.rs

use portal_ar::engine_lib::{CrossingState, OverlayMode, TrackingMode};

/// Snapshot of the runtime shown in the status panel.
pub struct PortalStatus {
    pub mode: Option<TrackingMode>,
    pub crossing: CrossingState,
    pub signed_distance: Option<f32>,
    pub occlusion_opacity: f32,
    pub overlay: OverlayMode,
    pub camera_preview: bool,
    pub last_error: Option<String>,
}

pub fn build_ui(ctx: &egui::Context, status: &PortalStatus) {
    egui::Window::new("Portal")
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .resizable(false)
        .show(ctx, |ui| {
            ui.vertical(|ui| {
                let mode = match status.mode {
                    Some(TrackingMode::PreciseHitTest) => "precise hit-test",
                    Some(TrackingMode::MarkerFallback) => "marker fallback",
                    None => "not selected",
                };
                ui.label(format!("Tracking: {}", mode));
                ui.label(format!("Crossing: {:?}", status.crossing));
                match status.signed_distance {
                    Some(d) => ui.label(format!("Signed distance: {:+.2} m", d)),
                    None => ui.label("Signed distance: -"),
                };
                ui.label(format!("Occlusion: {:.2} ({:?})", status.occlusion_opacity, status.overlay));
                ui.label(format!("Camera preview: {}", if status.camera_preview { "on" } else { "off" }));
                if let Some(err) = &status.last_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
                ui.separator();

                ui.label("🎮 Keyboard Controls:");
                ui.label("   W/A/S/D: Walk");
                ui.label("   Space / L-Shift: Up / Down");
                ui.label("   Arrow Keys: Look");
                ui.label("   Mouse (when grabbed): Look");
                ui.label("   Escape: Grab/Ungrab Mouse Cursor");
                ui.label("   Left Click: Pick the portal surface");
            });
        });
}
