use std::sync::Arc;

use rustc_hash::FxHashMap;
use tiny_skia::{
    self as skia, FillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pattern, Pixmap,
    PixmapPaint, SpreadMode, Transform,
};

use crate::coords::{Vec2, Viewport};
use crate::device::{DeviceError, GpuTexture, TextureDevice, TextureUpload};
use crate::paint::{BlendMode, Color};
use crate::scene::{DrawList, DrawPrimitive, Geometry, NodeId, SceneGraph};
use crate::texture::{ImageSource, ResourceManager, TextureError, TextureFrame, TextureId};

use super::options::{validate_resolution, validate_size};
use super::present::WindowPresenter;
use super::{
    ConfigError, FrameStats, RenderError, Renderer, RendererKind, RendererOptions, RendererState,
    check_alive, check_renderable,
};

/// CPU-side texture storage. Each upload becomes a pixmap.
#[derive(Default)]
struct PixmapStore {
    next: u32,
    pixmaps: FxHashMap<GpuTexture, Pixmap>,
    /// Tinted copies keyed by texture and tint bytes, with the frame they were last used in.
    tinted: FxHashMap<(GpuTexture, [u8; 4]), (Pixmap, u64)>,
}

impl PixmapStore {
    fn get(&self, texture: GpuTexture) -> Option<&Pixmap> {
        self.pixmaps.get(&texture)
    }

    fn tinted(&mut self, texture: GpuTexture, tint: Color, frame: u64) -> Option<&Pixmap> {
        let key = (texture, color_bytes(tint));
        if !self.tinted.contains_key(&key) {
            let copy = tint_pixmap(self.pixmaps.get(&texture)?, tint);
            self.tinted.insert(key, (copy, frame));
        }
        let (pixmap, used) = self.tinted.get_mut(&key)?;
        *used = frame;
        Some(pixmap)
    }

    fn evict_unused(&mut self, frame: u64) {
        self.tinted.retain(|_, (_, used)| *used == frame);
    }

    fn clear(&mut self) {
        self.pixmaps.clear();
        self.tinted.clear();
    }
}

impl TextureDevice for PixmapStore {
    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture, DeviceError> {
        let size = IntSize::from_wh(upload.width, upload.height)
            .ok_or_else(|| DeviceError::Upload(format!("`{}` has zero size", upload.key)))?;
        let pixmap = Pixmap::from_vec(upload.pixels.to_vec(), size).ok_or_else(|| {
            DeviceError::Upload(format!("`{}` pixel data does not match its size", upload.key))
        })?;
        self.next += 1;
        let texture = GpuTexture(self.next);
        self.pixmaps.insert(texture, pixmap);
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.pixmaps.remove(&texture);
        self.tinted.retain(|(t, _), _| *t != texture);
    }
}

/// Renderer that paints into a CPU pixmap with tiny-skia.
///
/// Used when no GPU is available or when software rendering is forced. It walks
/// the same paint-ordered list the batcher sees and paints every primitive on
/// its own; there is no batching and no device to lose. With a `view` each
/// frame is copied into the window; otherwise it stays in the pixmap.
pub struct SoftwareRenderer {
    options: RendererOptions,
    viewport: Viewport,
    state: RendererState,
    pixmap: Pixmap,
    presenter: Option<WindowPresenter>,
    textures: ResourceManager,
    store: PixmapStore,
    list: DrawList,
    frame: u64,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32, options: RendererOptions) -> Result<Self, RenderError> {
        options.validate(width, height)?;
        let viewport = Viewport::new(width as f32, height as f32, options.resolution);
        let pixmap = new_pixmap(viewport)?;
        let presenter = options
            .view
            .as_ref()
            .map(|window| WindowPresenter::new(Arc::clone(window)))
            .transpose()?;
        log::info!(
            "software renderer: {width}x{height} @{}x ({}x{}), {}",
            options.resolution,
            pixmap.width(),
            pixmap.height(),
            if presenter.is_some() { "presenting to window" } else { "offscreen" }
        );

        Ok(Self {
            options,
            viewport,
            state: RendererState::Uninitialized,
            pixmap,
            presenter,
            textures: ResourceManager::new(),
            store: PixmapStore::default(),
            list: DrawList::new(),
            frame: 0,
        })
    }

    /// The frame buffer, in device pixels.
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Premultiplied RGBA8, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Premultiplied RGBA8 of one device pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let p = self.pixmap.pixel(x, y)?;
        Some([p.red(), p.green(), p.blue(), p.alpha()])
    }

    /// Reallocates the frame buffer for `viewport`, copying the old pixels
    /// when the drawing buffer is preserved.
    fn apply_viewport(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        let mut pixmap = new_pixmap(viewport)?;
        if self.options.preserve_drawing_buffer {
            pixmap.draw_pixmap(
                0,
                0,
                self.pixmap.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
        self.pixmap = pixmap;
        self.viewport = viewport;
        log::debug!("software target resized to {}x{}", self.pixmap.width(), self.pixmap.height());
        Ok(())
    }

    fn paint_frame(&mut self, scene: &mut SceneGraph, root: NodeId) -> Result<FrameStats, RenderError> {
        let mut stats = FrameStats {
            transforms: scene.compute_world_transforms(root)?.recomputed,
            ..FrameStats::default()
        };
        self.list.clear();
        scene.flatten_into(root, &mut self.list)?;
        stats.primitives = self.list.len();

        self.frame += 1;
        let uploads = self.textures.upload_count();
        if let Some(color) = self.options.clear_color() {
            self.pixmap.fill(skia_color(color));
        }

        let resolution = self.viewport.resolution;
        let mut painter = Painter {
            target: &mut self.pixmap,
            textures: &mut self.textures,
            store: &mut self.store,
            frame: self.frame,
            to_device: Transform::from_scale(resolution, resolution),
            anti_alias: self.options.antialias,
        };
        for primitive in self.list.iter() {
            match painter.paint(primitive) {
                Ok(()) => stats.draw_calls += 1,
                Err(e) => {
                    log::warn!("primitive of {:?} dropped: {e}", primitive.node);
                    stats.dropped_primitives += 1;
                    stats.errors.push(e);
                }
            }
        }

        self.store.evict_unused(self.frame);
        stats.uploads = self.textures.upload_count() - uploads;
        if let Some(presenter) = self.presenter.as_mut() {
            if let Err(e) = presenter.present(&self.pixmap) {
                log::warn!("software frame not presented: {e}");
                stats.errors.push(e.into());
            }
        }
        log::trace!("software frame: {} primitives painted", stats.draw_calls);
        Ok(stats)
    }
}

/// Borrowed state for painting one frame.
struct Painter<'a> {
    target: &'a mut Pixmap,
    textures: &'a mut ResourceManager,
    store: &'a mut PixmapStore,
    frame: u64,
    to_device: Transform,
    anti_alias: bool,
}

impl Painter<'_> {
    fn paint(&mut self, primitive: &DrawPrimitive) -> Result<(), RenderError> {
        let Some(id) = primitive.texture else {
            self.paint_solid(primitive);
            return Ok(());
        };

        let texture = self.textures.ensure_resident(id, &mut *self.store)?;
        let view = *self
            .textures
            .view(id)
            .ok_or(TextureError::UnknownTexture(id))?;
        let image = if primitive.tint.is_white() {
            self.store.get(texture)
        } else {
            self.store.tinted(texture, primitive.tint, self.frame)
        }
        .ok_or(TextureError::UnknownTexture(id))?;

        let size = Vec2::new(image.width() as f32, image.height() as f32);
        let texel = |uv: Vec2| uv.scale(size);
        let mut paint = Paint {
            blend_mode: skia_blend(primitive.blend),
            anti_alias: self.anti_alias,
            ..Paint::default()
        };

        match &primitive.geometry {
            Geometry::Quad { corners } => {
                let [tl, tr, _, bl] = view.uvs().map(texel);
                let Some(mapping) = affine_between([tl, tr, bl], [corners[0], corners[1], corners[3]])
                else {
                    return Ok(());
                };
                if let Some(path) = polygon(corners) {
                    paint.shader = image_shader(image, mapping);
                    self.target
                        .fill_path(&path, &paint, FillRule::Winding, self.to_device, None);
                }
            }
            Geometry::Mesh {
                positions,
                uvs,
                indices,
            } => {
                let Some(uvs) = uvs else { return Ok(()) };
                for tri in indices.chunks_exact(3) {
                    let [a, b, c] = [tri[0], tri[1], tri[2]].map(usize::from);
                    let dst = [positions[a], positions[b], positions[c]];
                    let src = [uvs[a], uvs[b], uvs[c]].map(|uv| texel(view.map_uv(uv)));
                    let (Some(mapping), Some(path)) = (affine_between(src, dst), polygon(&dst)) else {
                        continue;
                    };
                    paint.shader = image_shader(image, mapping);
                    self.target
                        .fill_path(&path, &paint, FillRule::Winding, self.to_device, None);
                }
            }
        }
        Ok(())
    }

    fn paint_solid(&mut self, primitive: &DrawPrimitive) {
        if primitive.tint.a <= 0.0 {
            return;
        }
        let mut paint = Paint {
            blend_mode: skia_blend(primitive.blend),
            anti_alias: self.anti_alias,
            ..Paint::default()
        };
        paint.set_color(skia_color(primitive.tint));

        let mut fill = |points: &[Vec2]| {
            if let Some(path) = polygon(points) {
                self.target
                    .fill_path(&path, &paint, FillRule::Winding, self.to_device, None);
            }
        };
        match &primitive.geometry {
            Geometry::Quad { corners } => fill(&corners[..]),
            Geometry::Mesh {
                positions, indices, ..
            } => {
                for tri in indices.chunks_exact(3) {
                    let [a, b, c] = [tri[0], tri[1], tri[2]].map(usize::from);
                    fill(&[positions[a], positions[b], positions[c]][..]);
                }
            }
        }
    }
}

fn image_shader(image: &Pixmap, mapping: Transform) -> skia::Shader<'_> {
    Pattern::new(
        image.as_ref(),
        SpreadMode::Pad,
        FilterQuality::Bilinear,
        1.0,
        mapping,
    )
}

/// Affine map taking the three `src` points onto the three `dst` points.
fn affine_between(src: [Vec2; 3], dst: [Vec2; 3]) -> Option<Transform> {
    let (u, v) = (src[1] - src[0], src[2] - src[0]);
    let (du, dv) = (dst[1] - dst[0], dst[2] - dst[0]);
    let det = u.x * v.y - v.x * u.y;
    if det == 0.0 || !det.is_finite() {
        return None;
    }

    let a = (du.x * v.y - dv.x * u.y) / det;
    let b = (du.y * v.y - dv.y * u.y) / det;
    let c = (dv.x * u.x - du.x * v.x) / det;
    let d = (dv.y * u.x - du.y * v.x) / det;
    let tx = dst[0].x - (a * src[0].x + c * src[0].y);
    let ty = dst[0].y - (b * src[0].x + d * src[0].y);
    Some(Transform::from_row(a, b, c, d, tx, ty))
}

fn polygon(points: &[Vec2]) -> Option<Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    pb.close();
    pb.finish()
}

fn tint_pixmap(source: &Pixmap, tint: Color) -> Pixmap {
    let factors = tint.clamped().to_array();
    let mut copy = source.clone();
    for px in copy.data_mut().chunks_exact_mut(4) {
        for (c, f) in px.iter_mut().zip(factors) {
            *c = (*c as f32 * f + 0.5) as u8;
        }
    }
    copy
}

fn color_bytes(color: Color) -> [u8; 4] {
    color.clamped().to_array().map(|v| (v * 255.0 + 0.5) as u8)
}

fn skia_color(color: Color) -> skia::Color {
    let (r, g, b, a) = color.clamped().to_straight();
    skia::Color::from_rgba(r.min(1.0), g.min(1.0), b.min(1.0), a).unwrap_or(skia::Color::TRANSPARENT)
}

fn skia_blend(mode: BlendMode) -> skia::BlendMode {
    match mode {
        BlendMode::Normal => skia::BlendMode::SourceOver,
        BlendMode::Add => skia::BlendMode::Plus,
        BlendMode::Multiply => skia::BlendMode::Multiply,
        BlendMode::Screen => skia::BlendMode::Screen,
    }
}

fn new_pixmap(viewport: Viewport) -> Result<Pixmap, ConfigError> {
    let (width, height) = viewport.physical_size();
    Pixmap::new(width, height).ok_or(ConfigError::TooLarge {
        width,
        height,
        max: super::MAX_DIMENSION,
    })
}

impl Renderer for SoftwareRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Software
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
        self.state = RendererState::Rendering;
        let result = self.paint_frame(scene, root);
        self.state = RendererState::Ready;
        result
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
        self.textures.clear(&mut self.store);
        self.store.clear();
        self.list.clear();
        self.presenter = None;
        self.state = RendererState::Destroyed;
        log::info!("software renderer destroyed");
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
        Ok(self.textures.release(id, &mut self.store)?)
    }
}
