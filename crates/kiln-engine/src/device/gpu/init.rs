/// Initialization parameters for the wgpu backend.
///
/// Keep this structure small. Add flags only when a concrete platform or backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// Off by default: blending then happens on stored values, the same way the
    /// software rasterizer blends, so both backends produce matching output.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is broadly supported.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features. Empty for portability.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,

    /// Upper bound on textures sampled per draw call. Clamped to the adapter limit.
    pub max_texture_slots: u8,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            max_texture_slots: 8,
        }
    }
}
