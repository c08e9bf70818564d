// src/lib.rs

pub mod engine_lib;
pub mod rendering_lib;
pub mod demo_scene;

pub use engine_lib::{PortalConfig, PortalRuntime};
