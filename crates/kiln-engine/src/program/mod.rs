//! Shader program cache.
//!
//! Programs are keyed by a [`FeatureSignature`]. The cache compiles each
//! signature once, elides redundant binds and uniform writes, and recompiles
//! everything after device loss.

mod cache;
mod features;

pub use cache::{ProgramCache, ProgramStats};
pub use features::{FeatureSignature, ProgramUniforms, ShaderFeatures};

use thiserror::Error;

/// Stable handle of a cached program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) u32);

impl ProgramId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    #[error("program for {signature:?} failed to compile: {reason}")]
    Compile {
        signature: FeatureSignature,
        reason: String,
    },

    #[error("program {0:?} is unknown")]
    Unknown(ProgramId),

    #[error("program {0:?} is not compiled (device lost?)")]
    NotCompiled(ProgramId),
}
