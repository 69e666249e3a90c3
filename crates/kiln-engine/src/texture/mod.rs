//! Texture handles and the resource manager.
//!
//! Logical handles (views onto a frame of an image) are separate from the
//! physical textures they reference. The manager owns physical textures,
//! counts references, uploads lazily and refills the GPU after device loss.

mod error;
mod manager;
mod source;
mod view;

pub use error::TextureError;
pub use manager::ResourceManager;
pub use source::{ImageSource, SourceRetention};
pub use view::{TextureFrame, TextureView};

slotmap::new_key_type! {
    /// Logical texture handle held by sprites and meshes.
    pub struct TextureId;

    /// Physical texture record inside the resource manager.
    pub struct BaseTextureId;
}
