// src/rendering_lib/mod.rs

pub mod compositor;
pub mod geometry;
pub mod intersection;
pub mod projection;
pub mod renderer;
pub mod scene_graph;
pub mod shader;
pub mod vertex;

pub use compositor::{CompositorContent, InteriorObject, SceneCompositor};
pub use geometry::{ConvexPolygon, Point2, MAX_VERTICES};
pub use intersection::ConvexIntersection;
pub use projection::{build_draw_list, DrawItem, Lighting, ViewProjection};
pub use renderer::Renderer;
pub use scene_graph::{Material, MeshKind, SceneGraph, SceneNode, Surface};
pub use vertex::Vertex;
