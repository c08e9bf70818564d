// src/rendering_lib/compositor.rs
//
// Owns the outer (AR) and inner (world) scene graphs. Interior objects are
// animated once in `AnimationState` and projected into both the inner graph
// and, for mirrored objects, viewer-local copies in the outer graph.

use glam::{EulerRot, Mat4, Vec2, Vec3};
use log::debug;

use crate::engine_lib::anchor::AnchorTransform;
use crate::engine_lib::crossing::CrossingState;
use crate::engine_lib::placement::ReticleUpdate;
use crate::engine_lib::transition::{OverlayMode, TransitionAnimator};
use crate::rendering_lib::scene_graph::{Material, MeshKind, NodeId, SceneGraph, SceneNode, Surface};

const FRAME_THICKNESS: f32 = 0.06;

#[derive(Clone, Debug)]
pub struct InteriorObject {
    pub name: String,
    pub mesh: MeshKind,
    pub material: Material,
    /// Rest transform relative to the anchor.
    pub base: Mat4,
    /// Angular velocity about local X, Y, Z in radians per second.
    pub spin: Vec3,
    /// Also rendered directly in the outer scene once the viewer is inside.
    pub mirrored: bool,
}

#[derive(Clone, Debug)]
pub struct CompositorContent {
    pub interior: Vec<InteriorObject>,
    pub portal_size: Vec2,
    pub frame_material: Material,
    pub reticle_material: Material,
    pub inner_clear_color: [f32; 4],
    pub overlay_color: [f32; 3],
}

#[derive(Clone, Copy, Debug)]
struct AnimationTrack {
    base: Mat4,
    spin: Vec3,
}

/// Single authoritative animation state for interior objects.
#[derive(Clone, Debug, Default)]
pub struct AnimationState {
    elapsed: f32,
    tracks: Vec<AnimationTrack>,
}

impl AnimationState {
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt.max(0.0);
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Anchor-relative transform of track `index` at the current time.
    pub fn local_transform(&self, index: usize) -> Option<Mat4> {
        let track = self.tracks.get(index)?;
        let angles = track.spin * self.elapsed;
        Some(track.base * Mat4::from_euler(EulerRot::XYZ, angles.x, angles.y, angles.z))
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

#[derive(Clone, Copy, Debug)]
struct MirrorBinding {
    track: usize,
    inner: NodeId,
    outer: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
}

pub struct SceneCompositor {
    outer: SceneGraph,
    inner: SceneGraph,
    reticle: NodeId,
    portal_surface: NodeId,
    portal_frame: Vec<NodeId>,
    bindings: Vec<MirrorBinding>,
    animation: AnimationState,
    content: CompositorContent,
    render_target: RenderTargetDesc,
    anchor: Option<AnchorTransform>,
    inside: bool,
    overlay_opacity: f32,
    overlay_mode: OverlayMode,
    clear_alpha: f32,
    released: bool,
}

impl SceneCompositor {
    pub fn new(content: CompositorContent, width: u32, height: u32) -> Self {
        let mut outer = SceneGraph::new();
        let mut inner = SceneGraph::new();

        let reticle = outer.add(
            SceneNode::new(
                "reticle",
                MeshKind::Ring { inner: 0.1, outer: 0.15, segments: 32 },
                Surface::Flat(content.reticle_material),
            )
            .hidden(),
        );
        let portal_surface = outer.add(
            SceneNode::new("portal_surface", MeshKind::Quad { size: content.portal_size }, Surface::PortalTexture).hidden(),
        );

        let size = content.portal_size;
        let frame_parts = [
            ("portal_frame_left", Vec3::new(FRAME_THICKNESS, size.y, FRAME_THICKNESS)),
            ("portal_frame_right", Vec3::new(FRAME_THICKNESS, size.y, FRAME_THICKNESS)),
            ("portal_frame_top", Vec3::new(size.x + 2.0 * FRAME_THICKNESS, FRAME_THICKNESS, FRAME_THICKNESS)),
        ];
        let portal_frame = frame_parts
            .iter()
            .map(|(name, size)| {
                outer.add(SceneNode::new(name, MeshKind::Box { size: *size }, Surface::Flat(content.frame_material)).hidden())
            })
            .collect();

        let mut tracks = Vec::with_capacity(content.interior.len());
        let mut bindings = Vec::with_capacity(content.interior.len());
        for object in &content.interior {
            let track = tracks.len();
            tracks.push(AnimationTrack { base: object.base, spin: object.spin });
            let inner_id = inner.add(SceneNode::new(&object.name, object.mesh.clone(), Surface::Flat(object.material)));
            let outer_id = object.mirrored.then(|| {
                let name = format!("{}_mirror", object.name);
                outer.add(SceneNode::new(&name, object.mesh.clone(), Surface::Flat(object.material)).hidden())
            });
            bindings.push(MirrorBinding { track, inner: inner_id, outer: outer_id });
        }

        Self {
            outer,
            inner,
            reticle,
            portal_surface,
            portal_frame,
            bindings,
            animation: AnimationState { elapsed: 0.0, tracks },
            content,
            render_target: RenderTargetDesc { width, height },
            anchor: None,
            inside: false,
            overlay_opacity: 0.0,
            overlay_mode: OverlayMode::Hidden,
            clear_alpha: 0.0,
            released: false,
        }
    }

    pub fn outer(&self) -> &SceneGraph {
        &self.outer
    }

    pub fn inner(&self) -> &SceneGraph {
        &self.inner
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn render_target(&self) -> RenderTargetDesc {
        self.render_target
    }

    pub fn inner_clear_color(&self) -> [f32; 4] {
        self.content.inner_clear_color
    }

    pub fn portal_size(&self) -> Vec2 {
        self.content.portal_size
    }

    pub fn anchor(&self) -> Option<AnchorTransform> {
        self.anchor
    }

    pub fn reticle_visible(&self) -> bool {
        self.outer.is_visible(self.reticle)
    }

    pub fn portal_visible(&self) -> bool {
        self.outer.is_visible(self.portal_surface)
    }

    pub fn frame_visible(&self) -> bool {
        self.portal_frame.iter().all(|&id| self.outer.is_visible(id))
    }

    /// True once the viewer-local interior copies are shown.
    pub fn interior_visible(&self) -> bool {
        self.bindings
            .iter()
            .filter_map(|b| b.outer)
            .any(|id| self.outer.is_visible(id))
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn clear_alpha(&self) -> f32 {
        self.clear_alpha
    }

    pub fn overlay_mode(&self) -> OverlayMode {
        self.overlay_mode
    }

    /// Colour of the full-surround occlusion backdrop, `None` when it is not drawn.
    pub fn overlay_color(&self) -> Option<[f32; 4]> {
        let [r, g, b] = self.content.overlay_color;
        match self.overlay_mode {
            OverlayMode::Hidden => None,
            OverlayMode::Blended => Some([r, g, b, self.overlay_opacity]),
            OverlayMode::Opaque => Some([r, g, b, 1.0]),
        }
    }

    /// World transform of the portal surface quad, bottom edge on the anchor.
    pub fn portal_surface_transform(anchor: &AnchorTransform, portal_size: Vec2) -> Mat4 {
        anchor.to_matrix() * Mat4::from_translation(Vec3::new(0.0, portal_size.y * 0.5, 0.0))
    }

    pub fn update_reticle(&mut self, update: ReticleUpdate) {
        match update {
            ReticleUpdate::Visible(pose) => {
                self.outer.set_transform(self.reticle, pose.to_matrix());
                self.outer.set_visible(self.reticle, true);
            }
            ReticleUpdate::Hidden => self.outer.set_visible(self.reticle, false),
        }
    }

    /// Positions the portal surface and frame on `anchor`.
    pub fn place_anchor(&mut self, anchor: Option<AnchorTransform>, visible: bool) {
        self.anchor = anchor;
        let show = visible && anchor.is_some() && !self.inside;
        if let Some(anchor) = anchor {
            let size = self.content.portal_size;
            let surface = Self::portal_surface_transform(&anchor, size);
            self.outer.set_transform(self.portal_surface, surface);

            let half_w = size.x * 0.5 + FRAME_THICKNESS * 0.5;
            let offsets = [
                Vec3::new(-half_w, 0.0, 0.0),
                Vec3::new(half_w, 0.0, 0.0),
                Vec3::new(0.0, size.y * 0.5 + FRAME_THICKNESS * 0.5, 0.0),
            ];
            for (&id, offset) in self.portal_frame.iter().zip(offsets) {
                self.outer.set_transform(id, surface * Mat4::from_translation(offset));
            }
        }
        self.outer.set_visible(self.portal_surface, show);
        for &id in &self.portal_frame {
            self.outer.set_visible(id, show);
        }
    }

    pub fn apply_crossing(&mut self, state: CrossingState) {
        self.inside = state == CrossingState::Inside;
        debug!("compositor crossing state {:?}", state);
        let show_portal = !self.inside && self.anchor.is_some();
        self.outer.set_visible(self.portal_surface, show_portal);
        for &id in &self.portal_frame {
            self.outer.set_visible(id, show_portal);
        }
        for binding in &self.bindings {
            if let Some(id) = binding.outer {
                self.outer.set_visible(id, self.inside);
            }
        }
        if self.inside {
            self.outer.set_visible(self.reticle, false);
        }
    }

    pub fn apply_transition(&mut self, transition: &TransitionAnimator) {
        self.overlay_opacity = transition.occlusion_opacity();
        self.overlay_mode = transition.overlay_mode();
        self.clear_alpha = transition.clear_alpha();
    }

    /// Advances the interior animation and copies it into both graphs.
    pub fn advance(&mut self, dt: f32) {
        self.animation.advance(dt);
        self.project_interior();
    }

    fn project_interior(&mut self) {
        let root = self.anchor.map_or(Mat4::IDENTITY, |a| a.to_matrix());
        for binding in &self.bindings {
            let Some(local) = self.animation.local_transform(binding.track) else { continue };
            let world = root * local;
            self.inner.set_transform(binding.inner, world);
            if let Some(id) = binding.outer {
                self.outer.set_transform(id, world);
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.render_target = RenderTargetDesc { width, height };
    }

    /// Back to the pre-placement defaults and the transparent AR background.
    pub fn reset(&mut self) {
        self.anchor = None;
        self.inside = false;
        self.outer.set_visible(self.reticle, false);
        self.outer.set_visible(self.portal_surface, false);
        for &id in &self.portal_frame {
            self.outer.set_visible(id, false);
        }
        for binding in &self.bindings {
            if let Some(id) = binding.outer {
                self.outer.set_visible(id, false);
            }
        }
        self.overlay_opacity = 0.0;
        self.overlay_mode = OverlayMode::Hidden;
        self.clear_alpha = 0.0;
        self.animation.reset();
    }

    /// Drops all geometry and materials. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        debug!("releasing compositor scene graphs");
        self.reset();
        self.outer.clear();
        self.inner.clear();
        self.bindings.clear();
        self.portal_frame.clear();
        self.animation.tracks.clear();
        self.released = true;
    }
}
