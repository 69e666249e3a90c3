use crate::batch::{Batch, BatchBuilder, BatchSet};
use crate::coords::Viewport;
use crate::device::{DeviceError, DrawCall, FrameStatus, GpuDevice, GpuTexture};
use crate::program::{FeatureSignature, ProgramCache, ProgramUniforms, ShaderFeatures};
use crate::scene::{DrawList, NodeId, SceneGraph};
use crate::texture::{ImageSource, ResourceManager, TextureError, TextureFrame, TextureId};

use super::options::{validate_output, validate_resolution, validate_size};
use super::{
    FrameStats, RenderError, Renderer, RendererKind, RendererOptions, RendererState, check_alive,
    check_renderable,
};

/// Batched renderer over a [`GpuDevice`].
///
/// Each frame: world transforms → flatten → batch → one draw call per batch.
/// Device loss is sampled once at the start of `render`; textures and programs
/// are restored before anything is drawn.
pub struct HardwareRenderer {
    device: Box<dyn GpuDevice>,
    options: RendererOptions,
    viewport: Viewport,
    state: RendererState,
    /// GPU resources were already dropped for the current loss.
    loss_handled: bool,

    textures: ResourceManager,
    programs: ProgramCache,
    batcher: BatchBuilder,
    list: DrawList,
    slots: Vec<GpuTexture>,
}

impl HardwareRenderer {
    pub fn new(
        width: u32,
        height: u32,
        options: RendererOptions,
        mut device: Box<dyn GpuDevice>,
    ) -> Result<Self, RenderError> {
        options.validate(width, height)?;
        let viewport = Viewport::new(width as f32, height as f32, options.resolution);
        let limits = device.limits();
        validate_output(viewport, limits.max_texture_size)?;
        let (pw, ph) = viewport.physical_size();
        if device.surface_size() != (pw, ph) {
            device.resize(pw, ph)?;
        }

        log::info!(
            "hardware renderer: {width}x{height} @{}x ({pw}x{ph}), {} texture slots",
            options.resolution,
            limits.max_texture_slots
        );

        Ok(Self {
            device,
            options,
            viewport,
            state: RendererState::Uninitialized,
            loss_handled: false,
            textures: ResourceManager::new(),
            programs: ProgramCache::new(),
            batcher: BatchBuilder::new(limits.max_texture_slots),
            list: DrawList::new(),
            slots: Vec::with_capacity(limits.max_texture_slots as usize),
        })
    }

    pub fn device(&self) -> &dyn GpuDevice {
        self.device.as_ref()
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// Batches of the last frame.
    pub fn batches(&self) -> &BatchSet {
        self.batcher.batches()
    }

    /// Compiles the two programs almost every scene needs before the first draw.
    fn warm_programs(&mut self, stats: &mut FrameStats) {
        let common = [
            FeatureSignature::new(ShaderFeatures::TEXTURED, 1),
            FeatureSignature::new(ShaderFeatures::TINTED, 0),
        ];
        for signature in common {
            if let Err(e) = self.programs.get_or_compile(signature, &mut *self.device) {
                stats.errors.push(e.into());
            }
        }
    }

    /// Drops GPU-side state for the pending loss (once) and rebuilds it.
    ///
    /// On failure the renderer stays in `ContextLost` and the next frame retries.
    fn recover(&mut self, stats: &mut FrameStats) -> Result<(), RenderError> {
        if !self.loss_handled {
            log::warn!("device lost; dropping GPU resources");
            self.textures.on_device_lost();
            self.programs.on_device_lost();
            self.loss_handled = true;
        }
        self.state = RendererState::ContextLost;

        self.device.restore().map_err(|e| {
            log::error!("device restore failed: {e}");
            RenderError::RestoreFailed(e)
        })?;
        self.loss_handled = false;
        stats.context_lost = true;

        let texture_errors = self.textures.on_device_restored(&mut *self.device);
        let program_errors = self.programs.on_device_restored(&mut *self.device);
        stats.errors.extend(texture_errors.into_iter().map(RenderError::from));
        stats.errors.extend(program_errors.into_iter().map(RenderError::from));

        self.state = RendererState::Ready;
        log::info!("device restored");
        Ok(())
    }

    /// Sizes the device for `viewport` and adopts it.
    fn apply_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        validate_output(viewport, self.device.limits().max_texture_size)?;
        let (pw, ph) = viewport.physical_size();
        self.device.resize(pw, ph)?;
        self.viewport = viewport;
        log::debug!(
            "viewport {}x{} @{}x ({pw}x{ph})",
            viewport.width,
            viewport.height,
            viewport.resolution
        );
        Ok(())
    }

    fn draw_frame(
        &mut self,
        scene: &mut SceneGraph,
        root: NodeId,
        stats: &mut FrameStats,
    ) -> Result<(), RenderError> {
        stats.transforms = scene.compute_world_transforms(root)?.recomputed;
        self.list.clear();
        scene.flatten_into(root, &mut self.list)?;
        stats.primitives = self.list.len();

        let Self {
            device,
            options,
            viewport,
            textures,
            programs,
            batcher,
            list,
            slots,
            ..
        } = self;

        let uploads = textures.upload_count();
        let binds = programs.stats().binds;

        if device.begin_frame(options.clear_color())? == FrameStatus::Skipped {
            log::debug!("frame skipped by the surface");
            stats.skipped = true;
            return Ok(());
        }
        programs.unbind();

        let set = batcher.build(list, textures);
        for &(index, id) in &set.skipped {
            log::warn!("primitive {index} dropped: texture {id:?} is unknown");
            stats.errors.push(TextureError::UnknownTexture(id).into());
        }
        stats.dropped_primitives = set.skipped.len();
        stats.batches = set.len();
        device.upload_geometry(&set.vertices, &set.indices);

        let uniforms = ProgramUniforms::orthographic(viewport.width, viewport.height);
        for batch in set.iter() {
            match draw_batch(batch, device.as_mut(), textures, programs, &uniforms, slots) {
                Ok(()) => stats.draw_calls += 1,
                Err(e) => {
                    let skipped = set
                        .skipped
                        .iter()
                        .filter(|(i, _)| batch.primitives.contains(i))
                        .count();
                    let dropped = batch.primitives.len() - skipped;
                    log::warn!("batch of {dropped} primitives dropped: {e}");
                    stats.dropped_primitives += dropped;
                    stats.errors.push(e);
                }
            }
        }

        device.end_frame()?;
        stats.uploads = textures.upload_count() - uploads;
        stats.program_binds = programs.stats().binds - binds;
        log::trace!(
            "frame: {} primitives, {} batches, {} draws",
            stats.primitives,
            stats.batches,
            stats.draw_calls
        );
        Ok(())
    }
}

fn draw_batch(
    batch: &Batch,
    device: &mut dyn GpuDevice,
    textures: &mut ResourceManager,
    programs: &mut ProgramCache,
    uniforms: &ProgramUniforms,
    slots: &mut Vec<GpuTexture>,
) -> Result<(), RenderError> {
    slots.clear();
    for &base in &batch.textures {
        slots.push(textures.ensure_base_resident(base, &mut *device)?);
    }

    let id = programs.get_or_compile(batch.signature(), &mut *device)?;
    programs.bind(id, &mut *device)?;
    programs.set_uniforms(id, uniforms, &mut *device)?;

    device.draw(&DrawCall {
        program: programs.program(id)?,
        blend: batch.blend,
        textures: slots,
        indices: batch.indices.clone(),
    });
    Ok(())
}

impl Renderer for HardwareRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Hardware
    }

    fn state(&self) -> RendererState {
        self.state
    }

    fn options(&self) -> &RendererOptions {
        &self.options
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn render(&mut self, scene: &mut SceneGraph, root: NodeId) -> Result<FrameStats, RenderError> {
        check_renderable(self.state)?;
        let mut stats = FrameStats::default();

        if self.device.poll_device_lost() || self.state == RendererState::ContextLost {
            self.recover(&mut stats)?;
        }
        if self.programs.is_empty() {
            self.warm_programs(&mut stats);
        }

        self.state = RendererState::Rendering;
        match self.draw_frame(scene, root, &mut stats) {
            Ok(()) => {
                self.state = RendererState::Ready;
                Ok(stats)
            }
            Err(RenderError::Device(DeviceError::Lost)) => {
                log::warn!("device lost while submitting; restoring on the next frame");
                self.state = RendererState::ContextLost;
                stats.context_lost = true;
                Ok(stats)
            }
            Err(e) => {
                self.state = RendererState::Ready;
                Err(e)
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        check_renderable(self.state)?;
        let viewport = validate_size(width, height, self.viewport.resolution)?;
        self.apply_viewport(viewport)
    }

    fn set_resolution(&mut self, resolution: f32) -> Result<(), RenderError> {
        check_renderable(self.state)?;
        validate_resolution(resolution)?;
        let (width, height) = (self.viewport.width as u32, self.viewport.height as u32);
        self.apply_viewport(validate_size(width, height, resolution)?)?;
        self.options.resolution = resolution;
        Ok(())
    }

    fn destroy(&mut self) {
        if self.state == RendererState::Destroyed {
            return;
        }
        self.textures.clear(&mut *self.device);
        self.device.destroy();
        self.state = RendererState::Destroyed;
        log::info!("hardware renderer destroyed");
    }

    fn textures(&self) -> &ResourceManager {
        &self.textures
    }

    fn acquire_texture(&mut self, source: &ImageSource) -> Result<TextureId, RenderError> {
        check_alive(self.state)?;
        Ok(self.textures.acquire(source))
    }

    fn acquire_texture_frame(
        &mut self,
        source: &ImageSource,
        frame: TextureFrame,
    ) -> Result<TextureId, RenderError> {
        check_alive(self.state)?;
        Ok(self.textures.acquire_frame(source, frame)?)
    }

    fn release_texture(&mut self, id: TextureId) -> Result<(), RenderError> {
        check_alive(self.state)?;
        Ok(self.textures.release(id, &mut *self.device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Rect, Vec2};
    use crate::device::{DeviceLimits, HeadlessControl, HeadlessDevice};
    use crate::render::ConfigError;
    use crate::paint::{BlendMode, Color};
    use crate::scene::{Mesh, Sprite};

    fn renderer(width: u32, height: u32) -> (HardwareRenderer, HeadlessControl) {
        renderer_with(width, height, RendererOptions::default())
    }

    fn renderer_with(width: u32, height: u32, options: RendererOptions) -> (HardwareRenderer, HeadlessControl) {
        let device = HeadlessDevice::new();
        let control = device.control();
        let r = HardwareRenderer::new(width, height, options, Box::new(device)).unwrap();
        (r, control)
    }

    fn checker(key: &str) -> ImageSource {
        ImageSource::solid(key, 4, 4, Color::from_rgba8(200, 40, 40, 255)).unwrap()
    }

    /// Root with two 10x10 sprites sharing one texture, at x = 0 and x = 20.
    fn two_sprites(r: &mut HardwareRenderer) -> (SceneGraph, NodeId, NodeId, NodeId) {
        let tex = r.acquire_texture(&checker("red")).unwrap();
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let a = g.create_sprite(Sprite::new(tex, Vec2::new(10.0, 10.0)));
        let b = g.create_sprite(Sprite::new(tex, Vec2::new(10.0, 10.0)));
        g.set_position(b, Vec2::new(20.0, 0.0)).unwrap();
        g.add_child(root, a).unwrap();
        g.add_child(root, b).unwrap();
        (g, root, a, b)
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn new_sizes_device_to_physical_pixels() {
        let options = RendererOptions::default().with_resolution(2.0);
        let (r, control) = renderer_with(400, 300, options);
        assert_eq!(control.surface_size(), (800, 600));
        assert_eq!(r.state(), RendererState::Uninitialized);
        assert_eq!(r.kind(), RendererKind::Hardware);
    }

    #[test]
    fn new_rejects_invalid_options() {
        let result = HardwareRenderer::new(0, 10, RendererOptions::default(), Box::new(HeadlessDevice::new()));
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    // ── batching ──────────────────────────────────────────────────────────

    #[test]
    fn shared_texture_sprites_draw_in_one_call() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, _) = two_sprites(&mut r);

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.primitives, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.uploads, 1);
        assert!(stats.errors.is_empty());
        assert_eq!(control.last_frame_draws().len(), 1);
        assert_eq!(control.last_frame_draws()[0].index_count, 12);
        assert_eq!(r.state(), RendererState::Ready);
    }

    #[test]
    fn blend_change_splits_the_batch() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, b) = two_sprites(&mut r);
        g.set_blend_mode(b, BlendMode::Add).unwrap();

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.batches, 2);
        let draws = control.last_frame_draws();
        assert_eq!(draws[0].blend, BlendMode::Normal);
        assert_eq!(draws[1].blend, BlendMode::Add);
    }

    #[test]
    fn second_frame_reuses_programs_and_textures() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, _) = two_sprites(&mut r);
        r.render(&mut g, root).unwrap();
        let compiles = control.compile_count();

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.uploads, 0);
        assert_eq!(stats.transforms, 0);
        assert_eq!(control.compile_count(), compiles);
        assert_eq!(control.frames(), 2);
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn resize_halves_device_output() {
        let (mut r, control) = renderer(800, 600);
        let tex = r.acquire_texture(&checker("red")).unwrap();
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let s = g.create_sprite(Sprite::new(tex, Vec2::new(800.0, 600.0)));
        g.add_child(root, s).unwrap();

        r.render(&mut g, root).unwrap();
        let before = control.last_frame_draws()[0].device_bounds;
        assert!((before[2] - 800.0).abs() < 1e-3 && (before[3] - 600.0).abs() < 1e-3);

        r.resize(400, 300).unwrap();
        assert_eq!(control.surface_size(), (400, 300));
        r.render(&mut g, root).unwrap();
        let after = control.last_frame_draws()[0].device_bounds;
        // logical coordinates are unchanged; the sprite now overhangs the surface
        assert!((after[2] - 800.0).abs() < 1e-3);

        // a sprite sized to the new viewport fills the halved surface
        g.set_scale(s, Vec2::new(0.5, 0.5)).unwrap();
        r.render(&mut g, root).unwrap();
        let half = control.last_frame_draws()[0].device_bounds;
        assert!((half[2] - 400.0).abs() < 1e-3 && (half[3] - 300.0).abs() < 1e-3);
    }

    #[test]
    fn resolution_change_rescales_device_output() {
        let (mut r, control) = renderer(400, 300);
        let (mut g, root, _, b) = two_sprites(&mut r);
        r.set_resolution(2.0).unwrap();
        assert_eq!(control.surface_size(), (800, 600));
        assert_eq!(r.viewport(), Viewport::new(400.0, 300.0, 2.0));
        assert_eq!(r.options().resolution, 2.0);

        g.set_blend_mode(b, BlendMode::Add).unwrap();
        r.render(&mut g, root).unwrap();
        let bounds = control.last_frame_draws()[1].device_bounds;
        assert!((bounds[0] - 40.0).abs() < 1e-3 && (bounds[2] - 60.0).abs() < 1e-3);

        assert!(matches!(r.set_resolution(f32::NAN), Err(RenderError::Config(_))));
        assert_eq!(control.surface_size(), (800, 600));
    }

    #[test]
    fn resize_rejects_zero() {
        let (mut r, _) = renderer(800, 600);
        assert!(matches!(r.resize(0, 10), Err(RenderError::Config(_))));
        assert_eq!(r.viewport().width, 800.0);
    }

    #[test]
    fn output_above_device_limit_is_rejected() {
        let limits = DeviceLimits {
            max_texture_size: 1024,
            ..DeviceLimits::default()
        };
        let options = RendererOptions::default().with_resolution(2.0);
        let result = HardwareRenderer::new(800, 600, options.clone(), Box::new(HeadlessDevice::with_limits(limits)));
        assert!(matches!(
            result,
            Err(RenderError::Config(ConfigError::OutputTooLarge {
                width: 1600,
                height: 1200,
                max: 1024
            }))
        ));

        let device = HeadlessDevice::with_limits(limits);
        let control = device.control();
        let mut r = HardwareRenderer::new(500, 400, options, Box::new(device)).unwrap();
        assert_eq!(control.surface_size(), (1000, 800));
        assert!(matches!(
            r.resize(600, 400),
            Err(RenderError::Config(ConfigError::OutputTooLarge { .. }))
        ));
        assert_eq!(control.surface_size(), (1000, 800));
        assert_eq!(r.viewport().width, 500.0);
    }

    // ── resource failures ─────────────────────────────────────────────────

    #[test]
    fn failed_upload_drops_only_that_batch() {
        let (mut r, control) = renderer(800, 600);
        let good = r.acquire_texture(&checker("good")).unwrap();
        let bad = r.acquire_texture(&checker("bad")).unwrap();
        control.fail_uploads_for("bad");

        let mut g = SceneGraph::new();
        let root = g.create_container();
        let a = g.create_sprite(Sprite::new(good, Vec2::new(10.0, 10.0)));
        let b = g.create_sprite(Sprite::new(bad, Vec2::new(10.0, 10.0)));
        g.set_blend_mode(b, BlendMode::Add).unwrap();
        g.add_child(root, a).unwrap();
        g.add_child(root, b).unwrap();

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.dropped_primitives, 1);
        assert!(matches!(stats.errors[..], [RenderError::Texture(TextureError::Upload { .. })]));
        assert_eq!(r.state(), RendererState::Ready);
    }

    #[test]
    fn compile_failure_drops_mesh_batch() {
        let (mut r, control) = renderer(800, 600);
        control.fail_compiles_for(FeatureSignature::new(ShaderFeatures::TINTED, 0));

        let mut g = SceneGraph::new();
        let root = g.create_container();
        let tri = Mesh::solid(
            vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)],
            vec![0u16, 1, 2],
            Color::WHITE,
        );
        let m = g.create_mesh(tri).unwrap();
        g.add_child(root, m).unwrap();

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.dropped_primitives, 1);
        assert!(stats.errors.iter().all(|e| matches!(e, RenderError::Program(_))));
        assert!(!stats.errors.is_empty());
    }

    #[test]
    fn released_texture_is_skipped_not_fatal() {
        let (mut r, _) = renderer(800, 600);
        let (mut g, root, a, _) = two_sprites(&mut r);
        let stale = r.acquire_texture(&checker("gone")).unwrap();
        r.release_texture(stale).unwrap();
        g.set_kind(a, crate::scene::NodeKind::Sprite(Sprite::new(stale, Vec2::new(4.0, 4.0))))
            .unwrap();

        let stats = r.render(&mut g, root).unwrap();
        assert_eq!(stats.dropped_primitives, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.errors, vec![RenderError::Texture(TextureError::UnknownTexture(stale))]);
    }

    // ── device loss ───────────────────────────────────────────────────────

    #[test]
    fn device_loss_round_trip_restores_everything() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, _) = two_sprites(&mut r);
        r.render(&mut g, root).unwrap();
        let programs = control.live_programs();
        let texture = control.last_frame_draws()[0].textures[0];
        let pixels = control.texture_pixels(texture).unwrap();

        control.lose_device();
        let stats = r.render(&mut g, root).unwrap();
        assert!(stats.context_lost);
        assert!(stats.errors.is_empty());
        assert_eq!(control.restores(), 1);
        assert_eq!(control.live_programs(), programs);
        assert_eq!(stats.draw_calls, 1);

        let restored = control.last_frame_draws()[0].textures[0];
        assert_eq!(control.texture_pixels(restored).unwrap(), pixels);
        assert_eq!(r.state(), RendererState::Ready);
    }

    #[test]
    fn loss_during_submit_restores_on_the_next_frame() {
        let (mut r, control) = renderer(800, 600);
        let tex = r.acquire_texture(&checker("red")).unwrap();
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let s = g.create_sprite(Sprite::new(tex, Vec2::new(10.0, 10.0)));
        g.add_child(root, s).unwrap();
        r.render(&mut g, root).unwrap();
        let signature = control.last_frame_draws()[0].signature;
        let programs = r.programs().len();

        control.lose_device_on_submit();
        let stats = r.render(&mut g, root).unwrap();
        assert!(stats.context_lost);
        assert_eq!(r.state(), RendererState::ContextLost);
        assert_eq!(control.frames(), 1);
        assert_eq!(control.restores(), 0);

        let stats = r.render(&mut g, root).unwrap();
        assert!(stats.context_lost);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(r.state(), RendererState::Ready);
        assert_eq!(control.restores(), 1);
        assert_eq!(control.frames(), 2);
        assert!(r.textures().is_resident(tex));
        assert_eq!(r.programs().len(), programs);
        assert_eq!(control.last_frame_draws()[0].signature, signature);
    }

    #[test]
    fn failed_restore_is_retried_next_frame() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, _) = two_sprites(&mut r);
        r.render(&mut g, root).unwrap();

        control.lose_device();
        control.fail_restore(true);
        assert!(matches!(r.render(&mut g, root), Err(RenderError::RestoreFailed(_))));
        assert_eq!(r.state(), RendererState::ContextLost);
        assert!(matches!(r.render(&mut g, root), Err(RenderError::RestoreFailed(_))));

        control.fail_restore(false);
        let stats = r.render(&mut g, root).unwrap();
        assert!(stats.context_lost);
        assert_eq!(stats.draw_calls, 1);
        // the texture resident before the first loss was re-uploaded on restore
        assert_eq!(stats.uploads, 0);
        assert_eq!(control.live_textures(), 1);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn destroyed_renderer_refuses_work() {
        let (mut r, control) = renderer(800, 600);
        let (mut g, root, _, _) = two_sprites(&mut r);
        r.render(&mut g, root).unwrap();

        r.destroy();
        assert!(control.is_destroyed());
        assert_eq!(control.live_textures(), 0);
        assert_eq!(r.render(&mut g, root), Err(RenderError::Destroyed));
        assert_eq!(r.resize(10, 10), Err(RenderError::Destroyed));
        assert!(matches!(r.acquire_texture(&checker("late")), Err(RenderError::Destroyed)));
        r.destroy();
    }

    #[test]
    fn stale_scene_errors_propagate() {
        let (mut r, _) = renderer(800, 600);
        let mut g = SceneGraph::new();
        let root = g.create_container();
        g.destroy(root).unwrap();
        assert!(matches!(r.render(&mut g, root), Err(RenderError::Scene(_))));
        assert_eq!(r.state(), RendererState::Ready);
    }

    #[test]
    fn trimmed_sprite_bounds_reach_device() {
        let (mut r, control) = renderer(100, 100);
        let tex = r.acquire_texture(&checker("t")).unwrap();
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let mut sprite = Sprite::new(tex, Vec2::new(20.0, 20.0));
        sprite.trim = Some(Rect::new(5.0, 5.0, 10.0, 10.0));
        let s = g.create_sprite(sprite);
        g.add_child(root, s).unwrap();

        r.render(&mut g, root).unwrap();
        let b = control.last_frame_draws()[0].device_bounds;
        assert!((b[0] - 5.0).abs() < 1e-3 && (b[2] - 15.0).abs() < 1e-3);
    }
}
