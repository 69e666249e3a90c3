/// Compositing mode of a node against what is already in the frame.
///
/// All modes operate on premultiplied colors. Two primitives can share a draw
/// call only when their blend modes are equal.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Normal,
    /// Additive (`src + dst`).
    Add,
    /// `src * dst + dst * (1 - src_alpha)`.
    Multiply,
    /// `src + dst * (1 - src)`.
    Screen,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [
        BlendMode::Normal,
        BlendMode::Add,
        BlendMode::Multiply,
        BlendMode::Screen,
    ];

    /// Dense index, usable as an array slot for per-mode GPU pipelines.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Add => 1,
            BlendMode::Multiply => 2,
            BlendMode::Screen => 3,
        }
    }
}
