// src/rendering_lib/intersection.rs

use crate::rendering_lib::geometry::{ConvexPolygon, Point2, MAX_VERTICES};

/// Sutherland-Hodgman clipping of a subject polygon by a convex clip polygon.
/// The clip polygon must have positive signed area (see `ConvexPolygon::signed_area`).
pub struct ConvexIntersection;

impl ConvexIntersection {
    #[inline(always)]
    fn is_inside(point: &Point2, edge_start: &Point2, edge_end: &Point2) -> bool {
        (edge_end.x - edge_start.x) * (point.y - edge_start.y)
            - (edge_end.y - edge_start.y) * (point.x - edge_start.x)
            >= -1e-5
    }

    fn line_intersection(p1: &Point2, p2: &Point2, edge_start: &Point2, edge_end: &Point2) -> Option<Point2> {
        let dx_line = p2.x - p1.x;
        let dy_line = p2.y - p1.y;
        let dx_clip = edge_end.x - edge_start.x;
        let dy_clip = edge_end.y - edge_start.y;

        let denominator = dy_clip * dx_line - dx_clip * dy_line;
        if denominator.abs() < 1e-10 {
            return None;
        }
        let t = (dx_clip * (p1.y - edge_start.y) - dy_clip * (p1.x - edge_start.x)) / denominator;
        Some(Point2::new(p1.x + t * dx_line, p1.y + t * dy_line))
    }

    fn clip_by_edge(
        subject: &[Point2],
        edge_start: &Point2,
        edge_end: &Point2,
        out: &mut [Point2; MAX_VERTICES],
    ) -> usize {
        let Some(&last) = subject.last() else { return 0 };
        let mut count = 0;
        let mut push = |p: Point2, count: &mut usize| {
            if *count < MAX_VERTICES {
                out[*count] = p;
                *count += 1;
            }
        };

        let mut prev = last;
        for &current in subject {
            let prev_in = Self::is_inside(&prev, edge_start, edge_end);
            let current_in = Self::is_inside(&current, edge_start, edge_end);
            if prev_in != current_in {
                if let Some(hit) = Self::line_intersection(&prev, &current, edge_start, edge_end) {
                    push(hit, &mut count);
                }
            }
            if current_in {
                push(current, &mut count);
            }
            prev = current;
        }
        count
    }

    pub fn find_intersection_into(subject: &ConvexPolygon, clip: &ConvexPolygon, result: &mut ConvexPolygon) {
        let mut buffer_a = [Point2::default(); MAX_VERTICES];
        let mut buffer_b = [Point2::default(); MAX_VERTICES];

        let mut count = subject.count();
        if count == 0 {
            result.set_count(0);
            return;
        }
        if clip.count() < 3 {
            result.copy_vertices_from_slice(subject.vertices());
            return;
        }
        buffer_a[..count].copy_from_slice(subject.vertices());

        let mut input_is_a = true;
        let clip_verts = clip.vertices();
        for i in 0..clip_verts.len() {
            if count == 0 {
                break;
            }
            let edge_start = clip_verts[i];
            let edge_end = clip_verts[(i + 1) % clip_verts.len()];
            let (input, output) = if input_is_a {
                (&buffer_a[..count], &mut buffer_b)
            } else {
                (&buffer_b[..count], &mut buffer_a)
            };
            if input.iter().all(|p| Self::is_inside(p, &edge_start, &edge_end)) {
                continue;
            }
            count = Self::clip_by_edge(input, &edge_start, &edge_end, output);
            input_is_a = !input_is_a;
        }

        let final_slice = if input_is_a { &buffer_a[..count] } else { &buffer_b[..count] };
        result.copy_vertices_from_slice(final_slice);
    }

    pub fn clip_to_viewport(subject: &ConvexPolygon, width: f32, height: f32) -> ConvexPolygon {
        let mut result = ConvexPolygon::new();
        Self::find_intersection_into(subject, &ConvexPolygon::viewport(width, height), &mut result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_inside_viewport_is_unchanged() {
        let subject = ConvexPolygon::from_points(&[
            Point2::new(10.0, 10.0),
            Point2::new(50.0, 10.0),
            Point2::new(30.0, 40.0),
        ]);
        let clipped = ConvexIntersection::clip_to_viewport(&subject, 100.0, 100.0);
        assert_eq!(clipped.vertices(), subject.vertices());
    }

    #[test]
    fn overhanging_polygon_is_trimmed_to_viewport() {
        let subject = ConvexPolygon::from_points(&[
            Point2::new(-50.0, -50.0),
            Point2::new(150.0, -50.0),
            Point2::new(150.0, 150.0),
            Point2::new(-50.0, 150.0),
        ]);
        let clipped = ConvexIntersection::clip_to_viewport(&subject, 100.0, 80.0);
        assert!((clipped.area() - 8000.0).abs() < 1e-2);
    }

    #[test]
    fn disjoint_polygon_vanishes() {
        let subject = ConvexPolygon::from_points(&[
            Point2::new(200.0, 200.0),
            Point2::new(300.0, 200.0),
            Point2::new(250.0, 300.0),
        ]);
        assert!(ConvexIntersection::clip_to_viewport(&subject, 100.0, 100.0).count() < 3);
    }
}
