use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::device::WgpuInit;
use crate::render::{
    AutoRenderer, FrameStats, RenderError, Renderer, RendererOptions, WgpuProvider,
    autodetect_renderer_with,
};
use crate::scene::{NodeId, SceneGraph};

use super::clock::{FrameClock, FrameTime};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    /// Logical window size.
    pub width: u32,
    pub height: u32,
    pub force_software: bool,
    /// Base renderer options. `view` and `resolution` are filled in from the window.
    pub renderer: RendererOptions,
    pub wgpu: WgpuInit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_string(),
            width: 800,
            height: 600,
            force_software: false,
            renderer: RendererOptions::default(),
            wgpu: WgpuInit::default(),
        }
    }
}

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Per-frame context passed to [`App::update`].
pub struct FrameCtx<'a> {
    pub renderer: &'a mut AutoRenderer,
    pub scene: &'a mut SceneGraph,
    pub root: NodeId,
    pub time: FrameTime,
    /// Stats of the previous frame, if one was rendered.
    pub last_frame: Option<&'a FrameStats>,
}

/// Application contract.
pub trait App {
    /// Builds the initial scene and returns the root rendered every frame.
    fn init(&mut self, renderer: &mut AutoRenderer, scene: &mut SceneGraph) -> Result<NodeId>;

    /// Mutates the scene before each render.
    fn update(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Runs the event loop until the window closes or the app exits.
    ///
    /// Fails when the event loop, the window or the app's `init` fails.
    pub fn run<A>(config: RuntimeConfig, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Everything tied to the one window.
struct WindowEntry {
    window: Arc<Window>,
    renderer: AutoRenderer,
    scene: SceneGraph,
    root: NodeId,
    clock: FrameClock,
    last_frame: Option<FrameStats>,
}

struct AppState<A: App> {
    config: RuntimeConfig,
    app: A,
    entry: Option<WindowEntry>,
    exit_requested: bool,
    error: Option<anyhow::Error>,
}

impl<A: App> AppState<A> {
    fn new(config: RuntimeConfig, app: A) -> Self {
        Self {
            config,
            app,
            entry: None,
            exit_requested: false,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        self.exit(event_loop);
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(entry) = self.entry.as_mut() {
            entry.renderer.destroy();
        }
        self.entry = None;
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let scale = window.scale_factor();
        let (width, height) = logical_size(window.inner_size(), scale)
            .unwrap_or((self.config.width, self.config.height));
        let options = RendererOptions {
            resolution: scale as f32,
            view: Some(Arc::clone(&window)),
            ..self.config.renderer.clone()
        };

        let mut provider = WgpuProvider {
            init: self.config.wgpu.clone(),
        };
        let mut renderer =
            autodetect_renderer_with(&mut provider, width, height, options, self.config.force_software)
                .context("failed to create a renderer")?;
        log::info!("window {width}x{height} @{scale}x using {:?} renderer", renderer.kind());

        let mut scene = SceneGraph::new();
        let root = self
            .app
            .init(&mut renderer, &mut scene)
            .context("application init failed")?;

        Ok(WindowEntry {
            window,
            renderer,
            scene,
            root,
            clock: FrameClock::new(),
            last_frame: None,
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let time = entry.clock.tick();
        let mut ctx = FrameCtx {
            renderer: &mut entry.renderer,
            scene: &mut entry.scene,
            root: entry.root,
            time,
            last_frame: entry.last_frame.as_ref(),
        };
        let control = self.app.update(&mut ctx);

        match entry.renderer.render(&mut entry.scene, entry.root) {
            Ok(stats) => {
                for e in &stats.errors {
                    log::debug!("frame {}: {e}", time.frame_index);
                }
                entry.last_frame = Some(stats);
            }
            // Still lost; retried on the next redraw.
            Err(RenderError::RestoreFailed(e)) => log::warn!("device not restored yet: {e}"),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("render failed"));
                return;
            }
        }

        if control == AppControl::Exit {
            self.exit(event_loop);
        }
    }
}

/// Logical size of a physical window size. `None` while minimized.
fn logical_size(size: PhysicalSize<u32>, scale: f64) -> Option<(u32, u32)> {
    let logical: LogicalSize<f64> = size.to_logical(scale);
    let (w, h) = (logical.width.round() as u32, logical.height.round() as u32);
    (w > 0 && h > 0).then_some((w, h))
}

impl<A: App> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(entry) => {
                entry.window.request_redraw();
                self.entry = Some(entry);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        if self.entry.as_ref().is_none_or(|e| e.window.id() != window_id) {
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.exit(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.exit(event_loop),

            WindowEvent::Resized(size) => {
                let Some(entry) = self.entry.as_mut() else { return };
                let Some((w, h)) = logical_size(*size, entry.window.scale_factor()) else {
                    log::debug!("window minimized; resize ignored");
                    return;
                };
                if let Err(e) = entry.renderer.resize(w, h) {
                    log::warn!("resize to {w}x{h} failed: {e}");
                }
                entry.window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                // The Resized that follows carries the new physical size.
                let Some(entry) = self.entry.as_mut() else { return };
                log::info!("scale factor changed to {scale_factor}");
                if let Err(e) = entry.renderer.set_resolution(*scale_factor as f32) {
                    log::warn!("resolution {scale_factor} rejected: {e}");
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}
