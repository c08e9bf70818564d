// src/engine_lib/controller.rs
//
// Free-look keyboard/mouse control of the desktop preview viewer.

use glam::{Quat, Vec3};
use log::warn;
use winit::{
    event::{DeviceEvent, ElementState, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::engine_lib::geometry::Pose;

pub struct CameraController {
    pub move_input: Vec3,
    pub yaw_input: f32,
    pub pitch_input: f32,

    pub mouse_dx_accum: f32,
    pub mouse_dy_accum: f32,

    yaw: f32,
    pitch: f32,

    pub mouse_sensitivity: f32,
    pub cursor_grabbed: bool,
}

impl CameraController {
    pub fn new(initial_yaw_rad: f32, initial_pitch_rad: f32, initial_grab: bool, sensitivity: f32) -> Self {
        Self {
            move_input: Vec3::ZERO,
            yaw_input: 0.0,
            pitch_input: 0.0,
            mouse_dx_accum: 0.0,
            mouse_dy_accum: 0.0,
            yaw: initial_yaw_rad,
            pitch: initial_pitch_rad,
            mouse_sensitivity: sensitivity,
            cursor_grabbed: initial_grab,
        }
    }

    /// Returns true when the event was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        match event {
            WindowEvent::KeyboardInput { event: key_event, .. } => {
                let pressed = key_event.state == ElementState::Pressed;
                if pressed && key_event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.toggle_cursor_grab(window);
                    return true;
                }
                self.handle_key(key_event.physical_key, pressed)
            }
            WindowEvent::Focused(false) if self.cursor_grabbed => {
                self.grab_cursor(window, false);
                false
            }
            _ => false,
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> bool {
        let axis = if pressed { 1.0 } else { 0.0 };
        let PhysicalKey::Code(code) = key else { return false };
        match code {
            KeyCode::KeyW => self.move_input.z = -axis,
            KeyCode::KeyS => self.move_input.z = axis,
            KeyCode::KeyA => self.move_input.x = -axis,
            KeyCode::KeyD => self.move_input.x = axis,
            KeyCode::Space => self.move_input.y = axis,
            KeyCode::ShiftLeft | KeyCode::ControlLeft => self.move_input.y = -axis,
            KeyCode::ArrowLeft => self.yaw_input = axis,
            KeyCode::ArrowRight => self.yaw_input = -axis,
            KeyCode::ArrowUp => self.pitch_input = axis,
            KeyCode::ArrowDown => self.pitch_input = -axis,
            _ => return false,
        }
        true
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if !self.cursor_grabbed {
            self.mouse_dx_accum = 0.0;
            self.mouse_dy_accum = 0.0;
            return;
        }
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.mouse_dx_accum += *dx as f32;
            self.mouse_dy_accum += *dy as f32;
        }
    }

    pub fn toggle_cursor_grab(&mut self, window: &Window) {
        self.grab_cursor(window, !self.cursor_grabbed);
    }

    fn grab_cursor(&mut self, window: &Window, grab: bool) {
        if grab == self.cursor_grabbed {
            return;
        }
        if grab {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
            match grabbed {
                Ok(()) => {
                    window.set_cursor_visible(false);
                    self.cursor_grabbed = true;
                }
                Err(e) => warn!("could not grab cursor: {}", e),
            }
        } else {
            match window.set_cursor_grab(CursorGrabMode::None) {
                Ok(()) => {
                    window.set_cursor_visible(true);
                    self.cursor_grabbed = false;
                    self.mouse_dx_accum = 0.0;
                    self.mouse_dy_accum = 0.0;
                }
                Err(e) => warn!("could not release cursor: {}", e),
            }
        }
    }

    /// Integrates accumulated input into the viewer pose.
    pub fn apply_to_pose(&mut self, pose: &mut Pose, dt: f32) {
        let move_speed = 1.5 * dt;
        let rot_speed = 1.5 * dt;

        self.yaw -= self.mouse_dx_accum * self.mouse_sensitivity;
        self.yaw += self.yaw_input * rot_speed;
        self.pitch -= self.mouse_dy_accum * self.mouse_sensitivity;
        self.pitch += self.pitch_input * rot_speed;
        self.mouse_dx_accum = 0.0;
        self.mouse_dy_accum = 0.0;

        let pitch_limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = self.pitch.clamp(-pitch_limit, pitch_limit);

        // Moves stay level; looking up does not lift the viewer off the floor.
        let heading = Quat::from_rotation_y(self.yaw);
        pose.orientation = heading * Quat::from_rotation_x(self.pitch);
        let horizontal = heading * Vec3::new(self.move_input.x, 0.0, self.move_input.z);
        pose.position += (horizontal + Vec3::Y * self.move_input.y) * move_speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_key_walks_along_heading() {
        let mut controller = CameraController::new(0.0, 0.5, false, 0.002);
        let mut pose = Pose::IDENTITY;
        controller.handle_key(PhysicalKey::Code(KeyCode::KeyW), true);
        controller.apply_to_pose(&mut pose, 1.0);
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.5), 1e-5));
        controller.handle_key(PhysicalKey::Code(KeyCode::KeyW), false);
        controller.apply_to_pose(&mut pose, 1.0);
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.5), 1e-5));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut controller = CameraController::new(0.0, 0.0, false, 0.002);
        let mut pose = Pose::IDENTITY;
        controller.pitch_input = 1.0;
        controller.apply_to_pose(&mut pose, 10.0);
        assert!(controller.pitch < std::f32::consts::FRAC_PI_2);
    }
}
