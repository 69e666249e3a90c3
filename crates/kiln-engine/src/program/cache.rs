use rustc_hash::FxHashMap;

use crate::device::{GpuProgram, ProgramDevice};

use super::{FeatureSignature, ProgramError, ProgramId, ProgramUniforms};

#[derive(Debug, Clone)]
enum ProgramState {
    Compiled(GpuProgram),
    /// Compilation failed; cached so the signature is not recompiled every frame.
    Failed(String),
    /// Device went away; recompiled on restore.
    Lost,
}

#[derive(Debug, Clone)]
struct ProgramEntry {
    signature: FeatureSignature,
    state: ProgramState,
    last_uniforms: Option<ProgramUniforms>,
}

/// Cumulative counters. Renderers diff them per frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProgramStats {
    pub compiles: u64,
    pub compile_failures: u64,
    pub binds: u64,
    pub binds_elided: u64,
    pub uniform_writes: u64,
    pub uniform_writes_elided: u64,
}

/// Compiles each feature signature at most once and tracks the bound program.
///
/// Ids are indices into `entries` and stay stable for the cache's lifetime,
/// including across device loss.
#[derive(Debug, Default)]
pub struct ProgramCache {
    entries: Vec<ProgramEntry>,
    lookup: FxHashMap<FeatureSignature, ProgramId>,
    bound: Option<ProgramId>,
    stats: ProgramStats,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &mut self,
        signature: FeatureSignature,
        device: &mut dyn ProgramDevice,
    ) -> Result<ProgramId, ProgramError> {
        if let Some(&id) = self.lookup.get(&signature) {
            let entry = &mut self.entries[id.index()];
            return match &entry.state {
                ProgramState::Compiled(_) => Ok(id),
                ProgramState::Failed(reason) => Err(ProgramError::Compile {
                    signature,
                    reason: reason.clone(),
                }),
                ProgramState::Lost => {
                    compile_entry(entry, device, &mut self.stats)?;
                    Ok(id)
                }
            };
        }

        let id = ProgramId(self.entries.len() as u32);
        self.entries.push(ProgramEntry {
            signature,
            state: ProgramState::Lost,
            last_uniforms: None,
        });
        self.lookup.insert(signature, id);

        compile_entry(&mut self.entries[id.index()], device, &mut self.stats)?;
        Ok(id)
    }

    /// Binds `id` unless it is already bound.
    pub fn bind(&mut self, id: ProgramId, device: &mut dyn ProgramDevice) -> Result<(), ProgramError> {
        let program = self.program(id)?;
        if self.bound == Some(id) {
            self.stats.binds_elided += 1;
            return Ok(());
        }
        device.bind_program(program);
        self.bound = Some(id);
        self.stats.binds += 1;
        Ok(())
    }

    /// Writes uniforms unless they equal the last values written to `id`.
    pub fn set_uniforms(
        &mut self,
        id: ProgramId,
        values: &ProgramUniforms,
        device: &mut dyn ProgramDevice,
    ) -> Result<(), ProgramError> {
        let program = self.program(id)?;
        let entry = &mut self.entries[id.index()];
        if entry.last_uniforms.as_ref() == Some(values) {
            self.stats.uniform_writes_elided += 1;
            return Ok(());
        }
        device.set_uniforms(program, values);
        entry.last_uniforms = Some(*values);
        self.stats.uniform_writes += 1;
        Ok(())
    }

    /// Marks every program lost and forgets the bound program.
    pub fn on_device_lost(&mut self) {
        for entry in &mut self.entries {
            entry.state = ProgramState::Lost;
            entry.last_uniforms = None;
        }
        self.bound = None;
    }

    /// Recompiles every known signature. Ids are unchanged.
    ///
    /// A signature that failed before the loss gets one more attempt here.
    pub fn on_device_restored(&mut self, device: &mut dyn ProgramDevice) -> Vec<ProgramError> {
        let mut errors = Vec::new();
        for entry in &mut self.entries {
            if matches!(entry.state, ProgramState::Lost) {
                if let Err(e) = compile_entry(entry, device, &mut self.stats) {
                    errors.push(e);
                }
            }
        }
        if !self.entries.is_empty() {
            log::info!(
                "recompiled {} programs after device restore",
                self.entries.len() - errors.len()
            );
        }
        errors
    }

    /// Frame boundary: the device forgets its bound program between frames.
    pub fn unbind(&mut self) {
        self.bound = None;
    }

    #[inline]
    pub fn bound(&self) -> Option<ProgramId> {
        self.bound
    }

    pub fn signature(&self, id: ProgramId) -> Option<FeatureSignature> {
        self.entries.get(id.index()).map(|e| e.signature)
    }

    pub fn is_compiled(&self, id: ProgramId) -> bool {
        matches!(
            self.entries.get(id.index()).map(|e| &e.state),
            Some(ProgramState::Compiled(_))
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn stats(&self) -> ProgramStats {
        self.stats
    }

    /// Device handle of a compiled program.
    pub fn program(&self, id: ProgramId) -> Result<GpuProgram, ProgramError> {
        match self.entries.get(id.index()).map(|e| &e.state) {
            Some(ProgramState::Compiled(p)) => Ok(*p),
            Some(_) => Err(ProgramError::NotCompiled(id)),
            None => Err(ProgramError::Unknown(id)),
        }
    }
}

fn compile_entry(
    entry: &mut ProgramEntry,
    device: &mut dyn ProgramDevice,
    stats: &mut ProgramStats,
) -> Result<(), ProgramError> {
    match device.compile_program(entry.signature) {
        Ok(program) => {
            log::debug!("compiled program for {:?}", entry.signature);
            entry.state = ProgramState::Compiled(program);
            entry.last_uniforms = None;
            stats.compiles += 1;
            Ok(())
        }
        Err(e) => {
            let reason = e.to_string();
            log::error!("program for {:?} failed to compile: {reason}", entry.signature);
            entry.state = ProgramState::Failed(reason.clone());
            stats.compile_failures += 1;
            Err(ProgramError::Compile {
                signature: entry.signature,
                reason,
            })
        }
    }
}
