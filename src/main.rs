// src/main.rs
//
// Desktop preview of the portal: no AR session, the portal sits on its
// static default pose and a click on the surface enters it.

mod app;
mod ui;

use std::sync::Arc;
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window, WindowBuilder},
};

use app::PortalApp;

fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Warn).expect("Couldn't initialize logger");
        } else {
            env_logger::init();
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn attach_canvas(window: &Window) {
    use winit::platform::web::WindowExtWebSys;
    web_sys::window()
        .and_then(|win| win.document())
        .and_then(|doc| {
            let dst = doc.get_element_by_id("wasm-viewport")?;
            let canvas = web_sys::Element::from(window.canvas()?);
            dst.append_child(&canvas).ok()?;
            Some(())
        })
        .expect("Couldn't append canvas to document body.");
}

/// Update plus render for one displayed frame.
fn draw_frame(app: &mut PortalApp, window: &Window, target: &EventLoopWindowTarget<()>, dt: f32) {
    app.update(dt);
    match app.render(window) {
        Ok(()) => {}
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => app.resize(app.get_size()),
        Err(wgpu::SurfaceError::OutOfMemory) => {
            log::error!("surface out of memory, closing the preview");
            target.exit();
        }
        Err(e) => log::warn!("dropped frame: {:?}", e),
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn run() {
    init_logging();

    let event_loop = EventLoop::new().unwrap();
    let window: Arc<Window> = Arc::new(
        WindowBuilder::new()
            .with_title("Portal Preview")
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 768))
            .build(&event_loop)
            .unwrap(),
    );
    #[cfg(target_arch = "wasm32")]
    attach_canvas(&window);

    let mut preview = PortalApp::new(window.clone()).await;
    let mut last_frame = Instant::now();

    event_loop
        .run(move |event, target: &EventLoopWindowTarget<()>| {
            target.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { ref event, window_id } if window_id == window.id() => {
                    if preview.handle_window_event(event, &window) {
                        return;
                    }
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::Resized(size) => preview.resize(*size),
                        WindowEvent::Focused(focused) => preview.set_focused(*focused),
                        _ => {}
                    }
                }
                Event::DeviceEvent { event, .. } => preview.handle_device_event(&event, &window),
                Event::AboutToWait => {
                    let now = Instant::now();
                    draw_frame(&mut preview, &window, target, (now - last_frame).as_secs_f32());
                    last_frame = now;
                    if !target.exiting() {
                        window.request_redraw();
                    }
                }
                Event::LoopExiting => preview.shutdown(),
                _ => {}
            }
        })
        .unwrap();
}

#[tokio::main]
async fn main() {
    run().await;
}
