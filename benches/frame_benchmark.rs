// benches/frame_benchmark.rs
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Quat, Vec3};
use rand::Rng;

use portal_ar::demo_scene;
use portal_ar::engine_lib::{AnchorTransform, Camera, MarkerTracker, PortalConfig, PortalCore, Pose};
use portal_ar::rendering_lib::{build_draw_list, ConvexIntersection, ConvexPolygon, Lighting, Point2, MAX_VERTICES};

const WIDTH: f32 = 1280.0;
const HEIGHT: f32 = 720.0;

/// Regular polygon around a random centre that straddles the viewport border about half the time.
fn random_screen_polygon(rng: &mut impl Rng) -> ConvexPolygon {
    let sides = rng.gen_range(3..=MAX_VERTICES.min(8));
    let radius = rng.gen_range(60.0..400.0);
    let cx = rng.gen_range(-200.0..WIDTH + 200.0);
    let cy = rng.gen_range(-200.0..HEIGHT + 200.0);
    let points: Vec<Point2> = (0..sides)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / sides as f32;
            Point2::new(cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect();
    ConvexPolygon::from_points(&points)
}

fn portal_core() -> PortalCore {
    let config = PortalConfig::default();
    let content = demo_scene::portal_content(&config);
    let anchor = AnchorTransform::new(config.default_anchor_position, config.default_anchor_yaw);
    let mut core = PortalCore::new(config, content, WIDTH as u32, HEIGHT as u32);
    // install_tracker only fails on a second call
    let _ = core.install_tracker(Box::new(MarkerTracker::with_static_pose(anchor)));
    core
}

fn viewer_at(z: f32) -> Pose {
    Pose { position: Vec3::new(0.0, 1.6, z), orientation: Quat::IDENTITY, scale: Vec3::ONE }
}

fn frame_benchmark_fn(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    const NUM_BENCH_POLYGONS: usize = 100;
    let polygons: Vec<ConvexPolygon> = (0..NUM_BENCH_POLYGONS).map(|_| random_screen_polygon(&mut rng)).collect();
    let viewport = ConvexPolygon::viewport(WIDTH, HEIGHT);

    let mut group = c.benchmark_group("FrameOperations");

    group.bench_function("viewport_clip_100_polygons_reused_result", |b| {
        let mut result_poly = ConvexPolygon::new();
        let mut poly_iter = polygons.iter().cycle();
        b.iter(|| {
            let Some(poly) = poly_iter.next() else { return };
            ConvexIntersection::find_intersection_into(black_box(poly), black_box(&viewport), black_box(&mut result_poly))
        })
    });

    group.bench_function("portal_core_frame_outside", |b| {
        let mut core = portal_core();
        let viewer = viewer_at(0.0);
        b.iter(|| core.frame(black_box(&viewer), 1.0 / 60.0, None))
    });

    group.bench_function("build_draw_lists_inside", |b| {
        let mut core = portal_core();
        let viewer = viewer_at(-3.5);
        core.frame(&viewer, 1.0 / 60.0, None);
        let camera = Camera::new(demo_scene::PREVIEW_FOV_DEG, demo_scene::PREVIEW_ZNEAR, demo_scene::PREVIEW_ZFAR);
        let view = camera.view_projection(&viewer, WIDTH, HEIGHT);
        let lighting = Lighting::default();
        b.iter(|| {
            let outer = build_draw_list(core.compositor().outer(), black_box(&view), &lighting);
            let inner = build_draw_list(core.compositor().inner(), black_box(&view), &lighting);
            (outer, inner)
        })
    });

    group.finish();
}

criterion_group!(benches, frame_benchmark_fn);
criterion_main!(benches);
