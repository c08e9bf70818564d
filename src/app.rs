// src/app.rs

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::watch;
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceEvent, ElementState, MouseButton, WindowEvent},
    window::Window,
};

use portal_ar::demo_scene;
use portal_ar::engine_lib::{
    Camera, CameraController, CameraPreviewGate, FrameReport, FrameSource, HitTestSource, MarkerDetector,
    PlatformError, PortalConfig, PortalListener, PortalRuntime, Pose, ReferenceSpace, ReferenceSpaceKind,
    SessionFeatures, XrPlatform, XrSession,
};
use portal_ar::rendering_lib::Renderer;

use crate::ui::{build_ui, PortalStatus};

/// Uninhabited platform handle: the desktop preview can never hold one.
pub enum Unavailable {}

impl HitTestSource for Unavailable {
    fn results(&mut self) -> Vec<glam::Mat4> {
        match *self {}
    }
    fn cancel(&mut self) {
        match *self {}
    }
}

impl MarkerDetector for Unavailable {
    fn poll(&mut self) -> Option<glam::Mat4> {
        match *self {}
    }
}

impl XrSession for Unavailable {
    type HitTest = Unavailable;

    fn end_signal(&self) -> watch::Receiver<bool> {
        match *self {}
    }

    async fn request_reference_space(&mut self, _kind: ReferenceSpaceKind) -> Result<ReferenceSpace, PlatformError> {
        match *self {}
    }

    async fn request_hit_test_source(&mut self, _space: &ReferenceSpace) -> Result<Unavailable, PlatformError> {
        match *self {}
    }

    fn end(&mut self) -> Result<(), PlatformError> {
        match *self {}
    }
}

/// Degraded non-AR host: no immersive sessions and no marker detector, so
/// the runtime pins the portal to its static default pose.
pub struct DesktopPlatform;

impl XrPlatform for DesktopPlatform {
    type Session = Unavailable;
    type Marker = Unavailable;

    async fn supports_hit_test(&self) -> bool {
        false
    }

    async fn request_session(&self, _features: SessionFeatures) -> Result<Unavailable, PlatformError> {
        Err(PlatformError::new("immersive sessions are not available on this host"))
    }

    async fn load_marker_detector(&self) -> Result<Unavailable, PlatformError> {
        Err(PlatformError::new("no marker detection library on this host"))
    }
}

pub struct PortalApp {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    renderer: Renderer,
    runtime: PortalRuntime<DesktopPlatform>,
    camera: Camera,
    camera_controller: CameraController,
    viewer: Pose,
    cursor: Option<PhysicalPosition<f64>>,
    preview_gate: CameraPreviewGate,
    last_report: Option<FrameReport>,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    is_focused: bool,
}

impl PortalApp {
    pub async fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone()).unwrap();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .unwrap();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                },
                None,
            )
            .await
            .unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|m| *m == wgpu::CompositeAlphaMode::PreMultiplied)
            .unwrap_or(surface_caps.alpha_modes[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = Renderer::new(&device, config.format, config.width, config.height);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        let portal_config = PortalConfig::default();
        let content = demo_scene::portal_content(&portal_config);
        let runtime = PortalRuntime::new(DesktopPlatform, portal_config, content, config.width, config.height);
        if let Err(e) = runtime.start().await {
            warn!("portal start failed: {}", e);
        }
        info!("preview running in {:?} mode", runtime.tracking_mode());

        let (viewer, yaw, pitch) = demo_scene::initial_viewer_pose();
        let camera = Camera::new(demo_scene::PREVIEW_FOV_DEG, demo_scene::PREVIEW_ZNEAR, demo_scene::PREVIEW_ZFAR);
        let camera_controller = CameraController::new(yaw, pitch, false, 0.002);

        let mut app = Self {
            surface,
            device,
            queue,
            config,
            size,
            renderer,
            runtime,
            camera,
            camera_controller,
            viewer,
            cursor: None,
            preview_gate: CameraPreviewGate::new(),
            last_report: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            is_focused: window.has_focus(),
        };
        app.dispatch_events();
        app
    }

    pub fn get_size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if !self.runtime.on_resize(new_size.width, new_size.height) {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.renderer.resize(&self.device, new_size.width, new_size.height);
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    fn dispatch_events(&mut self) {
        for event in self.runtime.drain_events() {
            info!("portal event: {:?}", event);
            self.preview_gate.dispatch(event);
        }
    }

    pub fn update(&mut self, dt: f32) {
        if self.is_focused {
            self.camera_controller.apply_to_pose(&mut self.viewer, dt);
        }
        if let Some(report) = self.runtime.on_frame(FrameSource::Animation, &self.viewer, dt) {
            self.last_report = Some(report);
        }
        self.dispatch_events();
    }

    fn status(&self) -> PortalStatus {
        let (opacity, overlay) = self
            .runtime
            .with_core(|core| (core.transition().occlusion_opacity(), core.transition().overlay_mode()));
        PortalStatus {
            mode: self.runtime.tracking_mode(),
            crossing: self.runtime.crossing_state(),
            signed_distance: self.last_report.and_then(|r| r.signed_distance),
            occlusion_opacity: opacity,
            overlay,
            camera_preview: self.preview_gate.is_enabled(),
            last_error: self.runtime.last_error().map(|e| e.to_string()),
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let output_texture = self.surface.get_current_texture()?;
        let view = output_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Main Command Encoder"),
        });

        let projection = self.camera.view_projection(
            &self.viewer,
            self.config.width as f32,
            self.config.height as f32,
        );
        self.runtime.with_core(|core| {
            self.renderer.render_frame(
                &self.device,
                &self.queue,
                &mut encoder,
                &view,
                core.compositor(),
                &projection,
            )
        });

        let status = self.status();
        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| build_ui(ctx, &status));
        self.egui_state.handle_platform_output(window, full_output.platform_output);
        let tris = self.egui_ctx.tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        self.egui_renderer
            .update_buffers(&self.device, &self.queue, &mut encoder, &tris, &screen_descriptor);
        {
            let mut gui_render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("GUI Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.egui_renderer.render(&mut gui_render_pass, &tris, &screen_descriptor);
        }
        for tex_id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(tex_id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output_texture.present();
        Ok(())
    }

    /// Pointer ray-pick against the portal surface, the preview's commit trigger.
    fn pick_at_pointer(&mut self) {
        let (w, h) = (self.config.width as f32, self.config.height as f32);
        let (x, y) = match (self.camera_controller.cursor_grabbed, self.cursor) {
            (false, Some(p)) => (p.x as f32, p.y as f32),
            _ => (w * 0.5, h * 0.5),
        };
        let ray = self.camera.pointer_ray(&self.viewer, x, y, w, h);
        if self.runtime.pick(&ray) {
            self.dispatch_events();
        }
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        if self.egui_state.on_window_event(window, event).consumed {
            return true;
        }
        if self.camera_controller.handle_window_event(event, window) {
            return true;
        }
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(*position);
                false
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                self.pick_at_pointer();
                true
            }
            WindowEvent::Focused(focused) => {
                self.is_focused = *focused;
                false
            }
            _ => false,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent, _window: &Window) {
        self.camera_controller.handle_device_event(event);
    }

    pub fn shutdown(&mut self) {
        self.runtime.dispose();
        if !self.renderer.is_released() {
            self.renderer.release();
        }
    }
}

impl Drop for PortalApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}
