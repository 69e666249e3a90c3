use super::RenderError;

/// Lifecycle of a renderer.
///
/// `Uninitialized → Ready → Rendering → Ready`, `Ready → ContextLost → Ready`,
/// and any state `→ Destroyed`, which is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Ready,
    Rendering,
    ContextLost,
    Destroyed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RendererKind {
    Hardware,
    Software,
}

/// What one `render` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Nodes whose world transform was recomputed.
    pub transforms: usize,
    pub primitives: usize,
    pub batches: usize,
    pub draw_calls: usize,
    /// Primitives not drawn because of a resource failure.
    pub dropped_primitives: usize,
    pub program_binds: u64,
    pub uploads: u64,
    /// The device was lost (and restored) at the start of this frame, or was
    /// lost while it was being submitted.
    pub context_lost: bool,
    /// Nothing was presented; the surface asked to skip this frame.
    pub skipped: bool,
    /// Per-resource failures. Also logged.
    pub errors: Vec<RenderError>,
}
