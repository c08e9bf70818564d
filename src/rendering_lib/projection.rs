// src/rendering_lib/projection.rs
//
// CPU projection of scene graph polygons into screen-space draw items.

use glam::{Mat4, Vec3};

use crate::rendering_lib::geometry::{ConvexPolygon, Point2};
use crate::rendering_lib::intersection::ConvexIntersection;
use crate::rendering_lib::scene_graph::{SceneGraph, Surface};

/// Camera parameters for one pass.
#[derive(Clone, Copy, Debug)]
pub struct ViewProjection {
    view: Mat4,
    eye: Vec3,
    pub fov_y_rad: f32,
    pub znear: f32,
    pub zfar: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewProjection {
    /// `camera_pose` is the camera-to-world transform.
    pub fn new(camera_pose: Mat4, fov_y_rad: f32, znear: f32, zfar: f32, width: f32, height: f32) -> Self {
        Self {
            view: camera_pose.inverse(),
            eye: camera_pose.w_axis.truncate(),
            fov_y_rad,
            znear,
            zfar,
            width,
            height,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn to_camera_space(&self, world: Vec3) -> Vec3 {
        self.view.transform_point3(world)
    }

    /// Projects a camera-space point in front of the near plane to pixels.
    pub fn project(&self, p_cam: Vec3) -> Option<Point2> {
        if p_cam.z > -self.znear + 1e-6 || -p_cam.z < 1e-6 {
            return None;
        }
        let aspect = self.width / self.height;
        let focal_y = 1.0 / (self.fov_y_rad / 2.0).tan();
        let focal_x = focal_y / aspect;

        let ndc_x = (p_cam.x * focal_x) / -p_cam.z;
        let ndc_y = (p_cam.y * focal_y) / -p_cam.z;
        Some(Point2::new(
            (ndc_x + 1.0) * 0.5 * self.width,
            (1.0 - ndc_y) * 0.5 * self.height,
        ))
    }
}

/// One ambient and one directional light.
#[derive(Clone, Copy, Debug)]
pub struct Lighting {
    pub ambient: f32,
    pub directional: f32,
    /// Unit vector pointing towards the light.
    pub direction: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.5,
            directional: 1.0,
            direction: Vec3::new(5.0, 5.0, 5.0).normalize(),
        }
    }
}

impl Lighting {
    pub fn shade(&self, color: [f32; 4], normal: Vec3, emissive: f32) -> [f32; 4] {
        let lambert = normal.dot(self.direction).max(0.0);
        let k = self.ambient + self.directional * lambert;
        [
            (color[0] * k + emissive).min(1.0),
            (color[1] * k + emissive).min(1.0),
            (color[2] * k + emissive).min(1.0),
            color[3],
        ]
    }
}

#[derive(Clone, Debug)]
pub struct DrawItem {
    pub polygon: ConvexPolygon,
    pub color: [f32; 4],
    /// Mean view-space distance, used for painter ordering.
    pub depth: f32,
    /// Sampled from the inner render target instead of flat colour.
    pub portal: bool,
}

/// Sutherland-Hodgman against the plane z = -znear in camera space.
/// A point is kept when z < -znear.
pub fn clip_near_plane(polygon: &[Vec3], znear: f32) -> Vec<Vec3> {
    let Some(&last) = polygon.last() else { return Vec::new() };
    let plane = -znear;
    let mut out = Vec::with_capacity(polygon.len() + 1);
    let mut s = last;
    for &p in polygon {
        let s_in = s.z < plane;
        let p_in = p.z < plane;
        if s_in != p_in && (p.z - s.z).abs() > 1e-6 {
            let t = (plane - s.z) / (p.z - s.z);
            if (0.0..=1.0).contains(&t) {
                let i = s + (p - s) * t;
                out.push(Vec3::new(i.x, i.y, plane));
            }
        }
        if p_in {
            out.push(p);
        }
        s = p;
    }
    out
}

/// Projects every visible face of `graph`, sorted far to near.
pub fn build_draw_list(graph: &SceneGraph, view: &ViewProjection, lighting: &Lighting) -> Vec<DrawItem> {
    let mut items = Vec::new();
    for node in graph.visible_nodes() {
        let double_sided = node.mesh.is_double_sided();
        for face in node.faces() {
            if face.len() < 3 {
                continue;
            }
            let world: Vec<Vec3> = face.iter().map(|&v| node.transform.transform_point3(v)).collect();
            let mut normal = (world[1] - world[0]).cross(world[2] - world[0]).normalize_or_zero();
            let to_eye = view.eye() - world[0];
            if normal.dot(to_eye) <= 1e-6 {
                if !double_sided {
                    continue;
                }
                normal = -normal;
            }

            let cam: Vec<Vec3> = world.iter().map(|&p| view.to_camera_space(p)).collect();
            if cam.iter().all(|p| -p.z > view.zfar) {
                continue;
            }
            let clipped = clip_near_plane(&cam, view.znear);
            if clipped.len() < 3 {
                continue;
            }
            let projected: Vec<Point2> = clipped.iter().filter_map(|&p| view.project(p)).collect();
            if projected.len() < 3 {
                continue;
            }
            let polygon = ConvexIntersection::clip_to_viewport(
                &ConvexPolygon::from_points(&projected),
                view.width,
                view.height,
            );
            if polygon.count() < 3 {
                continue;
            }

            let depth = clipped.iter().map(|p| -p.z).sum::<f32>() / clipped.len() as f32;
            let (color, portal) = match node.surface {
                Surface::Flat(material) => (lighting.shade(material.color, normal, material.emissive), false),
                Surface::PortalTexture => ([1.0; 4], true),
            };
            items.push(DrawItem { polygon, color, depth, portal });
        }
    }
    items.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering_lib::scene_graph::{Material, MeshKind, SceneNode};
    use glam::Vec2;

    fn view() -> ViewProjection {
        ViewProjection::new(Mat4::IDENTITY, 75f32.to_radians(), 0.1, 100.0, 800.0, 600.0)
    }

    #[test]
    fn point_on_axis_projects_to_centre() {
        let p = view().project(Vec3::new(0.0, 0.0, -5.0)).unwrap();
        assert!((p.x - 400.0).abs() < 1e-3 && (p.y - 300.0).abs() < 1e-3);
        assert!(view().project(Vec3::new(0.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn near_clip_trims_straddling_edge() {
        let tri = [Vec3::new(-1.0, 0.0, -2.0), Vec3::new(1.0, 0.0, -2.0), Vec3::new(0.0, 0.0, 1.0)];
        let clipped = clip_near_plane(&tri, 0.1);
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|p| p.z <= -0.1 + 1e-5));
    }

    #[test]
    fn box_shows_at_most_three_faces() {
        let mut graph = SceneGraph::new();
        let id = graph.add(SceneNode::new("box", MeshKind::Box { size: Vec3::ONE }, Surface::Flat(Material::new([1.0; 4]))));
        graph.set_transform(id, Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)));
        let items = build_draw_list(&graph, &view(), &Lighting::default());
        assert_eq!(items.len(), 1);
        graph.set_transform(id, Mat4::from_translation(Vec3::new(1.0, 1.0, -4.0)));
        let items = build_draw_list(&graph, &view(), &Lighting::default());
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn quads_are_drawn_from_behind_and_sorted() {
        let mut graph = SceneGraph::new();
        let near = graph.add(SceneNode::new("near", MeshKind::Quad { size: Vec2::ONE }, Surface::PortalTexture));
        let far = graph.add(SceneNode::new("far", MeshKind::Quad { size: Vec2::ONE }, Surface::Flat(Material::new([0.5; 4]))));
        graph.set_transform(near, Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)));
        // turned away from the camera
        graph.set_transform(far, Mat4::from_rotation_translation(glam::Quat::from_rotation_y(std::f32::consts::PI), Vec3::new(0.0, 0.0, -6.0)));
        let items = build_draw_list(&graph, &view(), &Lighting::default());
        assert_eq!(items.len(), 2);
        assert!(items[0].depth > items[1].depth);
        assert!(!items[0].portal && items[1].portal);
    }

    #[test]
    fn shading_adds_emissive_and_keeps_alpha() {
        let lighting = Lighting::default();
        let lit = lighting.shade([0.2, 0.2, 0.2, 0.5], lighting.direction, 0.1);
        assert!((lit[0] - (0.2 * 1.5 + 0.1)).abs() < 1e-5);
        assert_eq!(lit[3], 0.5);
        let dark = lighting.shade([0.2, 0.2, 0.2, 1.0], -lighting.direction, 0.0);
        assert!((dark[0] - 0.1).abs() < 1e-5);
    }
}
