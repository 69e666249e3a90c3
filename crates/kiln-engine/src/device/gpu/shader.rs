//! WGSL generation per feature signature.

use std::fmt::Write;

use crate::paint::BlendMode;
use crate::program::{FeatureSignature, ShaderFeatures};

const PRELUDE: &str = r#"struct Globals {
    projection: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;

struct VsIn {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
    @location(3) slot: u32,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) @interpolate(flat) slot: u32,
};

@vertex
fn vs_main(v: VsIn) -> VsOut {
    var out: VsOut;
    let p = v.position * globals.projection.xy + globals.projection.zw;
    out.clip = vec4<f32>(p, 0.0, 1.0);
    out.uv = v.uv;
    out.color = v.color;
    out.slot = v.slot;
    return out;
}
"#;

/// Source for one program.
///
/// Textured programs bind a sampler at `@group(1) @binding(0)` and slot `i` at
/// binding `i + 1`. Untextured programs output the vertex color.
pub(super) fn program_source(signature: FeatureSignature) -> String {
    let mut src = String::with_capacity(PRELUDE.len() + 1024);
    src.push_str(PRELUDE);

    let textured = signature.features.contains(ShaderFeatures::TEXTURED);
    let slots = signature.texture_slots.max(1);

    if textured {
        src.push_str("\n@group(1) @binding(0) var samp: sampler;\n");
        for i in 0..slots {
            let _ = writeln!(
                src,
                "@group(1) @binding({}) var tex{i}: texture_2d<f32>;",
                i as u32 + 1
            );
        }
        src.push_str("\nfn sample_slot(slot: u32, uv: vec2<f32>) -> vec4<f32> {\n    switch slot {\n");
        for i in 1..slots {
            let _ = writeln!(
                src,
                "        case {i}u: {{ return textureSampleLevel(tex{i}, samp, uv, 0.0); }}"
            );
        }
        src.push_str(
            "        default: { return textureSampleLevel(tex0, samp, uv, 0.0); }\n    }\n}\n",
        );
    }

    let body = match (textured, signature.features.contains(ShaderFeatures::TINTED)) {
        (true, true) => "sample_slot(v.slot, v.uv) * v.color",
        (true, false) => "sample_slot(v.slot, v.uv)",
        (false, _) => "v.color",
    };
    let _ = write!(
        src,
        "\n@fragment\nfn fs_main(v: VsOut) -> @location(0) vec4<f32> {{\n    return {body};\n}}\n"
    );
    src
}

fn component(src: wgpu::BlendFactor, dst: wgpu::BlendFactor) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: wgpu::BlendOperation::Add,
    }
}

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    let over = component(wgpu::BlendFactor::One, wgpu::BlendFactor::OneMinusSrcAlpha);
    wgpu::BlendState {
        color: over,
        alpha: over,
    }
}

/// Fixed-function blend state for premultiplied sources.
pub(super) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    use wgpu::BlendFactor::{Dst, One, OneMinusSrc, OneMinusSrcAlpha};

    let alpha_over = component(One, OneMinusSrcAlpha);
    match mode {
        BlendMode::Normal => premul_alpha_blend(),
        BlendMode::Add => wgpu::BlendState {
            color: component(One, One),
            alpha: component(One, One),
        },
        BlendMode::Multiply => wgpu::BlendState {
            color: component(Dst, OneMinusSrcAlpha),
            alpha: alpha_over,
        },
        BlendMode::Screen => wgpu::BlendState {
            color: component(One, OneMinusSrc),
            alpha: alpha_over,
        },
    }
}
