use std::f32::consts::TAU;

use anyhow::{Context, Result};
use kiln_engine::coords::{Rect, Vec2};
use kiln_engine::logging::{LoggingConfig, init_logging};
use kiln_engine::paint::{BlendMode, Color};
use kiln_engine::render::{AutoRenderer, Renderer, RendererOptions};
use kiln_engine::scene::{Mesh, NodeId, SceneGraph, Sprite};
use kiln_engine::texture::{ImageSource, TextureFrame};
use kiln_engine::window::{App, AppControl, FrameCtx, Runtime, RuntimeConfig};

const ATLAS_CELL: u32 = 32;

/// Demo scene: an atlas of colored tiles orbiting the center, a checkerboard
/// backdrop, and a few meshes showing the blend modes.
struct Studio {
    orbit: Option<NodeId>,
    tiles: Vec<NodeId>,
    fan: Option<NodeId>,
    elapsed: f32,
}

impl Studio {
    fn new() -> Self {
        Self {
            orbit: None,
            tiles: Vec::new(),
            fan: None,
            elapsed: 0.0,
        }
    }
}

impl App for Studio {
    fn init(&mut self, renderer: &mut AutoRenderer, scene: &mut SceneGraph) -> Result<NodeId> {
        let viewport = renderer.viewport();
        let center = Vec2::new(viewport.width * 0.5, viewport.height * 0.5);
        let root = scene.create_container();

        // backdrop
        let checker = renderer.acquire_texture(&checkerboard(64, 8)?)?;
        let backdrop = scene.create_sprite(Sprite::new(
            checker,
            Vec2::new(viewport.width, viewport.height),
        ));
        scene.set_alpha(backdrop, 0.35)?;
        scene.add_child(root, backdrop)?;

        // orbiting atlas tiles, all from one physical texture
        let atlas = tile_atlas()?;
        let orbit = scene.create_container();
        scene.set_position(orbit, center)?;
        scene.add_child(root, orbit)?;
        for i in 0..8u32 {
            let cell = i % 4;
            let frame = TextureFrame::new(Rect::new(
                (cell * ATLAS_CELL) as f32,
                0.0,
                ATLAS_CELL as f32,
                ATLAS_CELL as f32,
            ));
            let tex = renderer.acquire_texture_frame(&atlas, frame)?;
            let tile = scene.create_sprite(
                Sprite::new(tex, Vec2::new(48.0, 48.0)).with_anchor(Vec2::new(0.5, 0.5)),
            );
            let angle = i as f32 / 8.0 * TAU;
            scene.set_position(tile, Vec2::new(angle.cos() * 180.0, angle.sin() * 180.0))?;
            if i >= 4 {
                scene.set_blend_mode(tile, BlendMode::Add)?;
            }
            scene.add_child(orbit, tile)?;
            self.tiles.push(tile);
        }

        // blend mode swatches
        for (i, mode) in BlendMode::ALL.into_iter().enumerate() {
            let swatch = scene.create_mesh(hexagon(40.0, Color::from_rgba8(230, 120, 40, 200)))?;
            scene.set_position(swatch, Vec2::new(70.0 + i as f32 * 100.0, viewport.height - 70.0))?;
            scene.set_blend_mode(swatch, mode)?;
            scene.add_child(root, swatch)?;
        }

        // textured triangle fan
        let fan = scene.create_mesh(textured_fan(checker, 90.0, 12))?;
        scene.set_position(fan, center)?;
        scene.set_tint(fan, Color::from_rgba8(120, 200, 255, 255))?;
        scene.add_child(root, fan)?;

        self.orbit = Some(orbit);
        self.fan = Some(fan);
        log::info!("studio scene: {} nodes", scene.len());
        Ok(root)
    }

    fn update(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        self.elapsed += ctx.time.dt;
        if let Err(e) = self.animate(ctx.scene) {
            log::error!("animation failed: {e:#}");
            return AppControl::Exit;
        }

        if ctx.time.frame_index % 300 == 0 {
            if let Some(stats) = ctx.last_frame {
                log::info!(
                    "{:?}: {} primitives in {} batches, {} dropped",
                    ctx.renderer.kind(),
                    stats.primitives,
                    stats.batches,
                    stats.dropped_primitives
                );
            }
        }
        AppControl::Continue
    }
}

impl Studio {
    fn animate(&self, scene: &mut SceneGraph) -> Result<()> {
        let t = self.elapsed;
        if let Some(orbit) = self.orbit {
            scene.set_rotation(orbit, t * 0.4)?;
        }
        for (i, &tile) in self.tiles.iter().enumerate() {
            scene.set_rotation(tile, -t * (1.0 + i as f32 * 0.1))?;
            let pulse = 1.0 + 0.15 * (t * 2.0 + i as f32).sin();
            scene.set_scale(tile, Vec2::new(pulse, pulse))?;
        }
        if let Some(fan) = self.fan {
            scene.set_rotation(fan, -t * 0.25)?;
            scene.set_alpha(fan, 0.6 + 0.4 * (t * 0.7).sin().abs())?;
        }
        Ok(())
    }
}

fn checkerboard(size: u32, cell: u32) -> Result<ImageSource> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x / cell + y / cell) % 2 == 0 { 220 } else { 60 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    ImageSource::from_straight_rgba("studio/checker", size, size, pixels).context("checkerboard")
}

/// Four square cells side by side, each a flat color with a darker border.
fn tile_atlas() -> Result<ImageSource> {
    const COLORS: [[u8; 3]; 4] = [[235, 80, 70], [80, 200, 120], [70, 140, 235], [240, 200, 60]];
    let (w, h) = (ATLAS_CELL * 4, ATLAS_CELL);
    let mut pixels = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let [r, g, b] = COLORS[(x / ATLAS_CELL) as usize];
            let local = x % ATLAS_CELL;
            let border = local < 2 || local >= ATLAS_CELL - 2 || y < 2 || y >= h - 2;
            let shade = if border { 2 } else { 1 };
            pixels.extend_from_slice(&[r / shade, g / shade, b / shade, 255]);
        }
    }
    ImageSource::from_straight_rgba("studio/tiles", w, h, pixels).context("tile atlas")
}

fn hexagon(radius: f32, color: Color) -> Mesh {
    let mut vertices = vec![Vec2::ZERO];
    vertices.extend((0..6).map(|i| {
        let a = i as f32 / 6.0 * TAU;
        Vec2::new(a.cos() * radius, a.sin() * radius)
    }));
    let indices: Vec<u16> = (0..6u16).flat_map(|i| [0, i + 1, (i + 1) % 6 + 1]).collect();
    Mesh::solid(vertices, indices, color)
}

fn textured_fan(texture: kiln_engine::texture::TextureId, radius: f32, segments: u16) -> Mesh {
    let mut vertices = vec![Vec2::ZERO];
    let mut uvs = vec![Vec2::new(0.5, 0.5)];
    for i in 0..segments {
        let a = i as f32 / segments as f32 * TAU;
        let (s, c) = a.sin_cos();
        vertices.push(Vec2::new(c * radius, s * radius));
        uvs.push(Vec2::new(0.5 + c * 0.5, 0.5 + s * 0.5));
    }
    let indices: Vec<u16> = (0..segments)
        .flat_map(|i| [0, i + 1, (i + 1) % segments + 1])
        .collect();
    Mesh::textured(vertices, uvs, indices, texture)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let force_software = std::env::args().any(|a| a == "--software");
    let config = RuntimeConfig {
        title: "Kiln Studio".to_string(),
        width: 960,
        height: 640,
        force_software,
        renderer: RendererOptions {
            antialias: true,
            background_color: Color::from_rgba8(24, 26, 32, 255),
            ..RendererOptions::default()
        },
        ..RuntimeConfig::default()
    };

    Runtime::run(config, Studio::new())
}
