// src/rendering_lib/shader.rs

/// Flat-coloured screen-space polygons. Also used for the occlusion overlay.
pub const FLAT_SHADER_SOURCE: &str = r#"
struct ScreenDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> screen: ScreenDimensions;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.color = model.color;
    // pixels (y down) to NDC (y up)
    let x = (model.position.x / (screen.width / 2.0)) - 1.0;
    let y = 1.0 - (model.position.y / (screen.height / 2.0));
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// The portal surface: samples the inner scene target at the fragment's
/// own screen position, so the interior lines up with the outer camera.
pub const PORTAL_SHADER_SOURCE: &str = r#"
struct ScreenDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> screen: ScreenDimensions;

@group(1) @binding(0)
var inner_texture: texture_2d<f32>;
@group(1) @binding(1)
var inner_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tint: vec4<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.tint = model.color;
    let x = (model.position.x / (screen.width / 2.0)) - 1.0;
    let y = 1.0 - (model.position.y / (screen.height / 2.0));
    out.clip_position = vec4<f32>(x, y, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let uv = vec2<f32>(in.clip_position.x / screen.width, in.clip_position.y / screen.height);
    return textureSample(inner_texture, inner_sampler, uv) * in.tint;
}
"#;
