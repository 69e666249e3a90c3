use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::batch::Vertex;
use crate::paint::{BlendMode, Color};
use crate::program::{FeatureSignature, ProgramUniforms};

use super::{
    DeviceError, DeviceLimits, DrawCall, FrameStatus, GpuDevice, GpuProgram, GpuTexture,
    ProgramDevice, TextureDevice, TextureUpload,
};

/// One draw recorded by [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: GpuProgram,
    pub signature: Option<FeatureSignature>,
    pub blend: BlendMode,
    pub textures: Vec<GpuTexture>,
    pub index_count: u32,
    /// Device-pixel bounds of the drawn vertices, `[min_x, min_y, max_x, max_y]`.
    pub device_bounds: [f32; 4],
}

#[derive(Debug, Default)]
struct State {
    surface: (u32, u32),
    next_handle: u32,
    textures: FxHashMap<GpuTexture, Vec<u8>>,
    programs: FxHashMap<GpuProgram, FeatureSignature>,
    uniforms: FxHashMap<GpuProgram, ProgramUniforms>,
    bound: Option<GpuProgram>,

    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    in_frame: bool,
    frame_draws: Vec<DrawRecord>,
    last_frame: Vec<DrawRecord>,
    last_clear: Option<Color>,
    frames: u64,

    failing_uploads: FxHashSet<String>,
    failing_compiles: FxHashSet<FeatureSignature>,
    fail_restore: bool,
    /// Lose the device inside the next `end_frame`.
    lose_on_submit: bool,
    destroyed: bool,

    upload_attempts: u64,
    compiles: u64,
    compile_attempts: u64,
    binds: u64,
    uniform_writes: u64,
    restores: u64,
}

impl State {
    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// In-memory device that records everything it is asked to do.
///
/// Used for headless rendering and tests. Faults (device loss, failing uploads,
/// failing compiles, failing restore) are injected through [`HeadlessControl`].
#[derive(Debug)]
pub struct HeadlessDevice {
    limits: DeviceLimits,
    state: Arc<Mutex<State>>,
    lost: Arc<AtomicBool>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        let state = State {
            surface: (800, 600),
            ..State::default()
        };
        Self {
            limits,
            state: Arc::new(Mutex::new(state)),
            lost: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for inspecting the device and injecting faults.
    pub fn control(&self) -> HeadlessControl {
        HeadlessControl {
            state: Arc::clone(&self.state),
            lost: Arc::clone(&self.lost),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureDevice for HeadlessDevice {
    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture, DeviceError> {
        let lost = self.is_lost();
        let mut s = self.state();
        s.upload_attempts += 1;
        if s.destroyed {
            return Err(DeviceError::Destroyed);
        }
        if lost {
            return Err(DeviceError::Lost);
        }
        if s.failing_uploads.contains(upload.key) {
            return Err(DeviceError::Upload(format!("injected failure for `{}`", upload.key)));
        }
        let texture = GpuTexture(s.handle());
        s.textures.insert(texture, upload.pixels.to_vec());
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.state().textures.remove(&texture);
    }
}

impl ProgramDevice for HeadlessDevice {
    fn compile_program(&mut self, signature: FeatureSignature) -> Result<GpuProgram, DeviceError> {
        let lost = self.is_lost();
        let mut s = self.state();
        s.compile_attempts += 1;
        if s.destroyed {
            return Err(DeviceError::Destroyed);
        }
        if lost {
            return Err(DeviceError::Lost);
        }
        if s.failing_compiles.contains(&signature) {
            return Err(DeviceError::Compile(format!("injected failure for {signature:?}")));
        }
        let program = GpuProgram(s.handle());
        s.programs.insert(program, signature);
        s.compiles += 1;
        Ok(program)
    }

    fn bind_program(&mut self, program: GpuProgram) {
        let mut s = self.state();
        s.bound = Some(program);
        s.binds += 1;
    }

    fn set_uniforms(&mut self, program: GpuProgram, uniforms: &ProgramUniforms) {
        let mut s = self.state();
        s.uniforms.insert(program, *uniforms);
        s.uniform_writes += 1;
    }
}

impl GpuDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn surface_size(&self) -> (u32, u32) {
        self.state().surface
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        let mut s = self.state();
        if s.destroyed {
            return Err(DeviceError::Destroyed);
        }
        s.surface = (width, height);
        Ok(())
    }

    fn begin_frame(&mut self, clear: Option<Color>) -> Result<FrameStatus, DeviceError> {
        let mut s = self.state();
        if s.destroyed {
            return Err(DeviceError::Destroyed);
        }
        s.in_frame = true;
        s.frame_draws.clear();
        s.vertices.clear();
        s.indices.clear();
        s.last_clear = clear;
        Ok(FrameStatus::Ready)
    }

    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) {
        let mut s = self.state();
        s.vertices.clear();
        s.vertices.extend_from_slice(vertices);
        s.indices.clear();
        s.indices.extend_from_slice(indices);
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let mut s = self.state();
        if !s.in_frame {
            log::warn!("headless draw outside of a frame ignored");
            return;
        }

        let uniforms = s.uniforms.get(&call.program).copied();
        let mut bounds = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
        let (w, h) = s.surface;
        let start = call.indices.start as usize;
        let end = (call.indices.end as usize).min(s.indices.len());
        for &i in s.indices.get(start..end).unwrap_or(&[]) {
            let Some(v) = s.vertices.get(i as usize) else { continue };
            // clip space back to device pixels
            let [cx, cy] = uniforms.map_or(v.position, |u| u.apply(v.position));
            let px = (cx + 1.0) * 0.5 * w as f32;
            let py = (1.0 - cy) * 0.5 * h as f32;
            bounds = [bounds[0].min(px), bounds[1].min(py), bounds[2].max(px), bounds[3].max(py)];
        }

        let record = DrawRecord {
            program: call.program,
            signature: s.programs.get(&call.program).copied(),
            blend: call.blend,
            textures: call.textures.to_vec(),
            index_count: call.indices.end.saturating_sub(call.indices.start),
            device_bounds: bounds,
        };
        s.frame_draws.push(record);
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let mut s = self.state();
        s.in_frame = false;
        if std::mem::take(&mut s.lose_on_submit) {
            self.lost.store(true, Ordering::Release);
        }
        if self.is_lost() {
            s.frame_draws.clear();
            return Err(DeviceError::Lost);
        }
        let draws = std::mem::take(&mut s.frame_draws);
        s.last_frame = draws;
        s.frames += 1;
        Ok(())
    }

    fn poll_device_lost(&mut self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn restore(&mut self) -> Result<(), DeviceError> {
        let mut s = self.state();
        if s.destroyed {
            return Err(DeviceError::Destroyed);
        }
        if s.fail_restore {
            return Err(DeviceError::Restore("injected restore failure".to_string()));
        }
        s.textures.clear();
        s.programs.clear();
        s.uniforms.clear();
        s.bound = None;
        s.in_frame = false;
        s.restores += 1;
        self.lost.store(false, Ordering::Release);
        Ok(())
    }

    fn destroy(&mut self) {
        let mut s = self.state();
        s.destroyed = true;
        s.textures.clear();
        s.programs.clear();
        s.uniforms.clear();
    }
}

/// Shared handle onto a [`HeadlessDevice`]'s state.
#[derive(Debug, Clone)]
pub struct HeadlessControl {
    state: Arc<Mutex<State>>,
    lost: Arc<AtomicBool>,
}

impl HeadlessControl {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── fault injection ───────────────────────────────────────────────────

    /// Signals device loss, as a driver callback would.
    pub fn lose_device(&self) {
        self.lost.store(true, Ordering::Release);
    }

    /// Loses the device while the next frame is being submitted.
    pub fn lose_device_on_submit(&self) {
        self.state().lose_on_submit = true;
    }

    pub fn fail_uploads_for(&self, key: &str) {
        self.state().failing_uploads.insert(key.to_string());
    }

    pub fn fail_compiles_for(&self, signature: FeatureSignature) {
        self.state().failing_compiles.insert(signature);
    }

    pub fn fail_restore(&self, fail: bool) {
        self.state().fail_restore = fail;
    }

    pub fn clear_faults(&self) {
        let mut s = self.state();
        s.failing_uploads.clear();
        s.failing_compiles.clear();
        s.fail_restore = false;
        s.lose_on_submit = false;
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    pub fn live_textures(&self) -> usize {
        self.state().textures.len()
    }

    pub fn texture_pixels(&self, texture: GpuTexture) -> Option<Vec<u8>> {
        self.state().textures.get(&texture).cloned()
    }

    pub fn live_programs(&self) -> usize {
        self.state().programs.len()
    }

    pub fn upload_attempts(&self) -> u64 {
        self.state().upload_attempts
    }

    /// Successful compiles over the device's lifetime.
    pub fn compile_count(&self) -> u64 {
        self.state().compiles
    }

    pub fn compile_attempts(&self) -> u64 {
        self.state().compile_attempts
    }

    pub fn bind_count(&self) -> u64 {
        self.state().binds
    }

    pub fn uniform_writes(&self) -> u64 {
        self.state().uniform_writes
    }

    pub fn restores(&self) -> u64 {
        self.state().restores
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.state().surface
    }

    /// Completed frames.
    pub fn frames(&self) -> u64 {
        self.state().frames
    }

    /// Draws of the last completed frame.
    pub fn last_frame_draws(&self) -> Vec<DrawRecord> {
        self.state().last_frame.clone()
    }

    pub fn last_clear(&self) -> Option<Color> {
        self.state().last_clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ShaderFeatures;

    fn upload(key: &str) -> TextureUpload<'_> {
        TextureUpload {
            key,
            width: 1,
            height: 1,
            pixels: &[1, 2, 3, 4],
        }
    }

    #[test]
    fn records_one_frame() {
        let mut dev = HeadlessDevice::new();
        let probe = dev.control();
        let program = dev
            .compile_program(FeatureSignature::new(ShaderFeatures::TINTED, 0))
            .unwrap();
        dev.set_uniforms(program, &ProgramUniforms::orthographic(800.0, 600.0));

        let v = |x: f32, y: f32| Vertex {
            position: [x, y],
            uv: [0.0, 0.0],
            color: [1.0; 4],
            slot: 0,
        };
        dev.begin_frame(Some(Color::BLACK)).unwrap();
        dev.upload_geometry(&[v(0.0, 0.0), v(100.0, 0.0), v(100.0, 50.0)], &[0, 1, 2]);
        dev.draw(&DrawCall {
            program,
            blend: BlendMode::Normal,
            textures: &[],
            indices: 0..3,
        });
        dev.end_frame().unwrap();

        let draws = probe.last_frame_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 3);
        let expected = [0.0, 0.0, 100.0, 50.0];
        for (got, want) in draws[0].device_bounds.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
        assert_eq!(probe.last_clear(), Some(Color::BLACK));
        assert_eq!(probe.frames(), 1);
    }

    #[test]
    fn lost_device_fails_frame_until_restored() {
        let mut dev = HeadlessDevice::new();
        let probe = dev.control();
        let tex = dev.create_texture(&upload("a")).unwrap();

        probe.lose_device();
        assert!(dev.poll_device_lost());
        assert_eq!(dev.create_texture(&upload("b")), Err(DeviceError::Lost));
        dev.begin_frame(None).unwrap();
        assert_eq!(dev.end_frame(), Err(DeviceError::Lost));

        dev.restore().unwrap();
        assert!(!dev.poll_device_lost());
        assert_eq!(probe.texture_pixels(tex), None);
        assert!(dev.create_texture(&upload("b")).is_ok());
    }

    #[test]
    fn injected_faults() {
        let mut dev = HeadlessDevice::new();
        let probe = dev.control();
        probe.fail_uploads_for("bad");
        probe.fail_restore(true);
        assert!(matches!(dev.create_texture(&upload("bad")), Err(DeviceError::Upload(_))));
        assert!(matches!(dev.restore(), Err(DeviceError::Restore(_))));
        probe.clear_faults();
        assert!(dev.create_texture(&upload("bad")).is_ok());
        assert!(dev.restore().is_ok());
    }

    #[test]
    fn destroyed_device_rejects_work() {
        let mut dev = HeadlessDevice::new();
        dev.destroy();
        assert_eq!(dev.begin_frame(None), Err(DeviceError::Destroyed));
        assert_eq!(dev.create_texture(&upload("a")), Err(DeviceError::Destroyed));
    }
}
