// src/rendering_lib/scene_graph.rs

use std::f32::consts::TAU;

use glam::{Mat4, Vec2, Vec3};

pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum MeshKind {
    /// Axis-aligned box centred on the origin.
    Box { size: Vec3 },
    /// Rectangle in the local XY plane facing +Z.
    Quad { size: Vec2 },
    /// Flat annulus in the local XZ plane facing +Y.
    Ring { inner: f32, outer: f32, segments: usize },
    /// Torus around the local Z axis.
    Torus { radius: f32, tube: f32, radial_segments: usize, tubular_segments: usize },
}

impl MeshKind {
    /// Flat meshes are drawn from both sides.
    pub fn is_double_sided(&self) -> bool {
        matches!(self, MeshKind::Quad { .. } | MeshKind::Ring { .. })
    }

    /// Local-space polygons, counter-clockwise seen from the outside.
    pub fn tessellate(&self) -> Vec<Vec<Vec3>> {
        match *self {
            MeshKind::Box { size } => {
                let h = size * 0.5;
                let v = |x: f32, y: f32, z: f32| Vec3::new(x * h.x, y * h.y, z * h.z);
                vec![
                    vec![v(-1.0, -1.0, 1.0), v(1.0, -1.0, 1.0), v(1.0, 1.0, 1.0), v(-1.0, 1.0, 1.0)],
                    vec![v(1.0, -1.0, -1.0), v(-1.0, -1.0, -1.0), v(-1.0, 1.0, -1.0), v(1.0, 1.0, -1.0)],
                    vec![v(1.0, -1.0, 1.0), v(1.0, -1.0, -1.0), v(1.0, 1.0, -1.0), v(1.0, 1.0, 1.0)],
                    vec![v(-1.0, -1.0, -1.0), v(-1.0, -1.0, 1.0), v(-1.0, 1.0, 1.0), v(-1.0, 1.0, -1.0)],
                    vec![v(-1.0, 1.0, 1.0), v(1.0, 1.0, 1.0), v(1.0, 1.0, -1.0), v(-1.0, 1.0, -1.0)],
                    vec![v(-1.0, -1.0, -1.0), v(1.0, -1.0, -1.0), v(1.0, -1.0, 1.0), v(-1.0, -1.0, 1.0)],
                ]
            }
            MeshKind::Quad { size } => {
                let h = size * 0.5;
                vec![vec![
                    Vec3::new(-h.x, -h.y, 0.0),
                    Vec3::new(h.x, -h.y, 0.0),
                    Vec3::new(h.x, h.y, 0.0),
                    Vec3::new(-h.x, h.y, 0.0),
                ]]
            }
            MeshKind::Ring { inner, outer, segments } => {
                let segments = segments.max(3);
                let point = |r: f32, i: usize| {
                    let a = i as f32 / segments as f32 * TAU;
                    Vec3::new(r * a.cos(), 0.0, -r * a.sin())
                };
                (0..segments)
                    .map(|i| vec![point(inner, i), point(outer, i), point(outer, i + 1), point(inner, i + 1)])
                    .collect()
            }
            MeshKind::Torus { radius, tube, radial_segments, tubular_segments } => {
                let radial = radial_segments.max(3);
                let tubular = tubular_segments.max(3);
                let point = |j: usize, i: usize| {
                    let u = i as f32 / tubular as f32 * TAU;
                    let v = j as f32 / radial as f32 * TAU;
                    let ring = radius + tube * v.cos();
                    Vec3::new(ring * u.cos(), ring * u.sin(), tube * v.sin())
                };
                let mut faces = Vec::with_capacity(radial * tubular);
                for j in 0..radial {
                    for i in 0..tubular {
                        faces.push(vec![point(j, i), point(j, i + 1), point(j + 1, i + 1), point(j + 1, i)]);
                    }
                }
                faces
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: [f32; 4],
    /// Added to the lit colour, 0 for none.
    pub emissive: f32,
}

impl Material {
    pub const fn new(color: [f32; 4]) -> Self {
        Self { color, emissive: 0.0 }
    }

    pub const fn emissive(color: [f32; 4], emissive: f32) -> Self {
        Self { color, emissive }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Surface {
    Flat(Material),
    /// Shows the offscreen render target of the inner scene.
    PortalTexture,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub mesh: MeshKind,
    pub surface: Surface,
    pub transform: Mat4,
    pub visible: bool,
    faces: Vec<Vec<Vec3>>,
}

impl SceneNode {
    pub fn new(name: &str, mesh: MeshKind, surface: Surface) -> Self {
        let faces = mesh.tessellate();
        Self {
            name: name.to_string(),
            mesh,
            surface,
            transform: Mat4::IDENTITY,
            visible: true,
            faces,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn faces(&self) -> &[Vec<Vec3>] {
        &self.faces
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.visible = visible;
        }
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.nodes.get(id).map_or(false, |n| n.visible)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Mat4) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform = transform;
        }
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter().filter(|n| n.visible)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops every node and its tessellated geometry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(face: &[Vec3]) -> Vec3 {
        (face[1] - face[0]).cross(face[2] - face[0]).normalize()
    }

    #[test]
    fn box_faces_point_outwards() {
        let faces = MeshKind::Box { size: Vec3::new(0.8, 0.4, 0.2) }.tessellate();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            let center = face.iter().copied().sum::<Vec3>() / face.len() as f32;
            assert!(face_normal(face).dot(center) > 0.0);
        }
    }

    #[test]
    fn quad_faces_positive_z() {
        let faces = MeshKind::Quad { size: Vec2::new(1.0, 2.0) }.tessellate();
        assert!(face_normal(&faces[0]).abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn ring_faces_up() {
        let faces = MeshKind::Ring { inner: 0.1, outer: 0.15, segments: 24 }.tessellate();
        assert_eq!(faces.len(), 24);
        assert!(faces.iter().all(|f| face_normal(f).dot(Vec3::Y) > 0.99));
    }

    #[test]
    fn graph_lookup_and_visibility() {
        let mut graph = SceneGraph::new();
        let id = graph.add(SceneNode::new("reticle", MeshKind::Quad { size: Vec2::ONE }, Surface::Flat(Material::new([1.0; 4]))).hidden());
        assert_eq!(graph.find("reticle"), Some(id));
        assert!(!graph.is_visible(id));
        graph.set_visible(id, true);
        assert_eq!(graph.visible_nodes().count(), 1);
        graph.clear();
        assert!(graph.is_empty());
    }
}
