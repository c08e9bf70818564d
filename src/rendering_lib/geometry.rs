// src/rendering_lib/geometry.rs
//
// Screen-space polygons produced by the CPU projection step.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Upper bound on vertices after near-plane and viewport clipping.
pub const MAX_VERTICES: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn cross(&self, other: &Point2) -> f32 {
        self.x * other.y - self.y * other.x
    }
}

impl From<Vec2> for Point2 {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Fixed-capacity convex polygon in pixel coordinates (origin top-left).
#[derive(Clone, Debug)]
pub struct ConvexPolygon {
    vertices: [Point2; MAX_VERTICES],
    count: usize,
}

impl Default for ConvexPolygon {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvexPolygon {
    pub fn new() -> Self {
        Self {
            vertices: [Point2::default(); MAX_VERTICES],
            count: 0,
        }
    }

    /// Extra points past `MAX_VERTICES` are dropped.
    pub fn from_points(points: &[Point2]) -> Self {
        let mut polygon = Self::new();
        polygon.copy_vertices_from_slice(points);
        polygon
    }

    /// The full viewport as a clip polygon.
    pub fn viewport(width: f32, height: f32) -> Self {
        Self::from_points(&[
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ])
    }

    pub fn vertices(&self) -> &[Point2] {
        &self.vertices[..self.count]
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count.min(MAX_VERTICES);
    }

    pub fn copy_vertices_from_slice(&mut self, slice: &[Point2]) {
        let n = slice.len().min(MAX_VERTICES);
        self.vertices[..n].copy_from_slice(&slice[..n]);
        self.count = n;
    }

    /// Shoelace sum. Positive when clockwise on screen (y down), which is
    /// counter-clockwise in world terms.
    pub fn signed_area(&self) -> f32 {
        if self.count < 3 {
            return 0.0;
        }
        let verts = self.vertices();
        let mut sum = 0.0;
        for i in 0..verts.len() {
            let j = (i + 1) % verts.len();
            sum += verts[i].cross(&verts[j]);
        }
        sum * 0.5
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    /// Reverses winding in place.
    pub fn reverse(&mut self) {
        self.vertices[..self.count].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_area() {
        let poly = ConvexPolygon::viewport(640.0, 480.0);
        assert_eq!(poly.count(), 4);
        assert!((poly.area() - 640.0 * 480.0).abs() < 1e-2);
    }

    #[test]
    fn reverse_flips_signed_area() {
        let mut poly = ConvexPolygon::from_points(&[
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ]);
        let before = poly.signed_area();
        poly.reverse();
        assert!((poly.signed_area() + before).abs() < 1e-5);
    }

    #[test]
    fn from_points_truncates() {
        let points = vec![Point2::new(1.0, 1.0); MAX_VERTICES + 4];
        assert_eq!(ConvexPolygon::from_points(&points).count(), MAX_VERTICES);
    }
}
