use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// Capabilities a primitive needs from its shader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFeatures: u32 {
        /// Samples a texture slot.
        const TEXTURED = 1 << 0;
        /// Multiplies by the vertex color.
        const TINTED   = 1 << 1;
    }
}

/// Cache key of a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureSignature {
    pub features: ShaderFeatures,
    /// Texture bindings declared by the program. Zero when untextured.
    pub texture_slots: u8,
}

impl FeatureSignature {
    pub fn new(features: ShaderFeatures, texture_slots: u8) -> Self {
        let texture_slots = if features.contains(ShaderFeatures::TEXTURED) {
            texture_slots.max(1)
        } else {
            0
        };
        Self {
            features,
            texture_slots,
        }
    }
}

/// Per-program uniform block.
///
/// `projection` is `(sx, sy, tx, ty)` with `clip = position * (sx, sy) + (tx, ty)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ProgramUniforms {
    pub projection: [f32; 4],
}

impl ProgramUniforms {
    /// Maps logical pixels (top-left origin, +Y down) onto clip space.
    pub fn orthographic(width: f32, height: f32) -> Self {
        let w = width.max(1.0);
        let h = height.max(1.0);
        Self {
            projection: [2.0 / w, -2.0 / h, -1.0, 1.0],
        }
    }

    pub fn apply(&self, p: [f32; 2]) -> [f32; 2] {
        let [sx, sy, tx, ty] = self.projection;
        [p[0] * sx + tx, p[1] * sy + ty]
    }
}
