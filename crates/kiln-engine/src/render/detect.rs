use std::sync::Arc;

use crate::coords::Viewport;
use crate::device::{DeviceError, GpuDevice, WgpuDevice, WgpuInit};
use crate::scene::{NodeId, SceneGraph};
use crate::texture::{ImageSource, ResourceManager, TextureFrame, TextureId};

use super::{
    FrameStats, HardwareRenderer, RenderError, Renderer, RendererKind, RendererOptions,
    RendererState, SoftwareRenderer,
};

/// Capability probe: hands out a hardware device, or fails.
///
/// Any `FnMut(width, height, &RendererOptions)` returning a device is a provider.
pub trait DeviceProvider {
    fn acquire(
        &mut self,
        width: u32,
        height: u32,
        options: &RendererOptions,
    ) -> Result<Box<dyn GpuDevice>, DeviceError>;
}

impl<F> DeviceProvider for F
where
    F: FnMut(u32, u32, &RendererOptions) -> Result<Box<dyn GpuDevice>, DeviceError>,
{
    fn acquire(
        &mut self,
        width: u32,
        height: u32,
        options: &RendererOptions,
    ) -> Result<Box<dyn GpuDevice>, DeviceError> {
        self(width, height, options)
    }
}

/// Acquires a [`WgpuDevice`] for `options.view`, or an offscreen one without a view.
#[derive(Debug, Clone, Default)]
pub struct WgpuProvider {
    pub init: WgpuInit,
}

impl DeviceProvider for WgpuProvider {
    fn acquire(
        &mut self,
        width: u32,
        height: u32,
        options: &RendererOptions,
    ) -> Result<Box<dyn GpuDevice>, DeviceError> {
        let (pw, ph) = Viewport::new(width as f32, height as f32, options.resolution).physical_size();
        let device = WgpuDevice::new(
            options.view.as_ref().map(Arc::clone),
            pw,
            ph,
            self.init.clone(),
            options.antialias,
            options.transparent,
        )?;
        Ok(Box::new(device))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Platform {
    Desktop,
    Android,
    Web,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Desktop
        }
    }
}

/// The renderer picked by autodetection.
pub enum AutoRenderer {
    Hardware(HardwareRenderer),
    Software(SoftwareRenderer),
}

impl AutoRenderer {
    pub fn as_hardware(&self) -> Option<&HardwareRenderer> {
        match self {
            AutoRenderer::Hardware(r) => Some(r),
            AutoRenderer::Software(_) => None,
        }
    }

    pub fn as_software(&self) -> Option<&SoftwareRenderer> {
        match self {
            AutoRenderer::Hardware(_) => None,
            AutoRenderer::Software(r) => Some(r),
        }
    }

    fn inner(&self) -> &dyn Renderer {
        match self {
            AutoRenderer::Hardware(r) => r,
            AutoRenderer::Software(r) => r,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Renderer {
        match self {
            AutoRenderer::Hardware(r) => r,
            AutoRenderer::Software(r) => r,
        }
    }
}

impl Renderer for AutoRenderer {
    fn kind(&self) -> RendererKind {
        self.inner().kind()
    }

    fn state(&self) -> RendererState {
        self.inner().state()
    }

    fn options(&self) -> &RendererOptions {
        self.inner().options()
    }

    fn viewport(&self) -> Viewport {
        self.inner().viewport()
    }

    fn render(&mut self, scene: &mut SceneGraph, root: NodeId) -> Result<FrameStats, RenderError> {
        self.inner_mut().render(scene, root)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.inner_mut().resize(width, height)
    }

    fn set_resolution(&mut self, resolution: f32) -> Result<(), RenderError> {
        self.inner_mut().set_resolution(resolution)
    }

    fn destroy(&mut self) {
        self.inner_mut().destroy()
    }

    fn textures(&self) -> &ResourceManager {
        self.inner().textures()
    }

    fn acquire_texture(&mut self, source: &ImageSource) -> Result<TextureId, RenderError> {
        self.inner_mut().acquire_texture(source)
    }

    fn acquire_texture_frame(
        &mut self,
        source: &ImageSource,
        frame: TextureFrame,
    ) -> Result<TextureId, RenderError> {
        self.inner_mut().acquire_texture_frame(source, frame)
    }

    fn release_texture(&mut self, id: TextureId) -> Result<(), RenderError> {
        self.inner_mut().release_texture(id)
    }
}

/// Hardware renderer when a wgpu device can be acquired, software otherwise.
pub fn autodetect_renderer(
    width: u32,
    height: u32,
    options: RendererOptions,
    force_software: bool,
) -> Result<AutoRenderer, RenderError> {
    autodetect_renderer_with(&mut WgpuProvider::default(), width, height, options, force_software)
}

pub fn autodetect_renderer_with(
    provider: &mut dyn DeviceProvider,
    width: u32,
    height: u32,
    options: RendererOptions,
    force_software: bool,
) -> Result<AutoRenderer, RenderError> {
    options.validate(width, height)?;

    if force_software || options.force_software {
        log::info!("software renderer forced");
        return Ok(AutoRenderer::Software(SoftwareRenderer::new(width, height, options)?));
    }

    match provider.acquire(width, height, &options) {
        Ok(device) => Ok(AutoRenderer::Hardware(HardwareRenderer::new(
            width, height, options, device,
        )?)),
        Err(e) => {
            log::warn!("no hardware context ({e}); falling back to software");
            Ok(AutoRenderer::Software(SoftwareRenderer::new(width, height, options)?))
        }
    }
}

/// Like [`autodetect_renderer`], but forces software where GPU drivers are
/// known to be unreliable (Android).
pub fn autodetect_recommended_renderer(
    width: u32,
    height: u32,
    options: RendererOptions,
) -> Result<AutoRenderer, RenderError> {
    autodetect_recommended_renderer_with(
        &mut WgpuProvider::default(),
        Platform::current(),
        width,
        height,
        options,
    )
}

pub fn autodetect_recommended_renderer_with(
    provider: &mut dyn DeviceProvider,
    platform: Platform,
    width: u32,
    height: u32,
    options: RendererOptions,
) -> Result<AutoRenderer, RenderError> {
    let force_software = platform == Platform::Android;
    if force_software {
        log::info!("software renderer recommended on {platform:?}");
    }
    autodetect_renderer_with(provider, width, height, options, force_software)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::HeadlessDevice;
    use crate::paint::BlendMode;
    use crate::scene::Sprite;

    fn headless(_: u32, _: u32, _: &RendererOptions) -> Result<Box<dyn GpuDevice>, DeviceError> {
        Ok(Box::new(HeadlessDevice::new()))
    }

    fn no_gpu(_: u32, _: u32, _: &RendererOptions) -> Result<Box<dyn GpuDevice>, DeviceError> {
        Err(DeviceError::NoAdapter("test".to_string()))
    }

    // ── selection ─────────────────────────────────────────────────────────

    #[test]
    fn picks_hardware_when_a_device_is_available() {
        let r = autodetect_renderer_with(&mut headless, 800, 600, RendererOptions::default(), false).unwrap();
        assert_eq!(r.kind(), RendererKind::Hardware);
        assert!(r.as_hardware().is_some());
    }

    #[test]
    fn falls_back_to_software() {
        let r = autodetect_renderer_with(&mut no_gpu, 800, 600, RendererOptions::default(), false).unwrap();
        assert_eq!(r.kind(), RendererKind::Software);
    }

    #[test]
    fn force_software_skips_the_probe() {
        let mut probed = false;
        let mut provider = |_: u32, _: u32, _: &RendererOptions| -> Result<Box<dyn GpuDevice>, DeviceError> {
            probed = true;
            Ok(Box::new(HeadlessDevice::new()))
        };
        let r = autodetect_renderer_with(&mut provider, 800, 600, RendererOptions::default(), true).unwrap();
        assert_eq!(r.kind(), RendererKind::Software);

        let options = RendererOptions {
            force_software: true,
            ..RendererOptions::default()
        };
        let r = autodetect_renderer_with(&mut provider, 800, 600, options, false).unwrap();
        assert_eq!(r.kind(), RendererKind::Software);
        assert!(!probed);
    }

    #[test]
    fn android_is_recommended_software() {
        let r = autodetect_recommended_renderer_with(
            &mut headless,
            Platform::Android,
            800,
            600,
            RendererOptions::default(),
        )
        .unwrap();
        assert_eq!(r.kind(), RendererKind::Software);

        let r = autodetect_recommended_renderer_with(
            &mut headless,
            Platform::Desktop,
            800,
            600,
            RendererOptions::default(),
        )
        .unwrap();
        assert_eq!(r.kind(), RendererKind::Hardware);
    }

    #[test]
    fn invalid_options_fail_before_probing() {
        let result = autodetect_renderer_with(&mut headless, 0, 600, RendererOptions::default(), false);
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    // ── same contract on both backends ────────────────────────────────────

    fn scene(r: &mut AutoRenderer) -> (SceneGraph, NodeId, NodeId) {
        let source = ImageSource::solid("white", 2, 2, crate::paint::Color::WHITE).unwrap();
        let tex = r.acquire_texture(&source).unwrap();
        let mut g = SceneGraph::new();
        let root = g.create_container();
        let a = g.create_sprite(Sprite::new(tex, Vec2::new(10.0, 10.0)));
        let b = g.create_sprite(Sprite::new(tex, Vec2::new(10.0, 10.0)));
        g.set_position(b, Vec2::new(20.0, 0.0)).unwrap();
        g.add_child(root, a).unwrap();
        g.add_child(root, b).unwrap();
        (g, root, b)
    }

    #[test]
    fn both_backends_honor_the_contract() {
        let mut hw = autodetect_renderer_with(&mut headless, 800, 600, RendererOptions::default(), false).unwrap();
        let mut sw = autodetect_renderer_with(&mut no_gpu, 800, 600, RendererOptions::default(), false).unwrap();

        for r in [&mut hw, &mut sw] {
            let (mut g, root, b) = scene(r);
            let stats = r.render(&mut g, root).unwrap();
            assert_eq!(stats.primitives, 2);
            assert_eq!(r.state(), RendererState::Ready);

            g.set_blend_mode(b, BlendMode::Add).unwrap();
            r.resize(400, 300).unwrap();
            assert_eq!(r.viewport().width, 400.0);
            r.set_resolution(2.0).unwrap();
            assert_eq!(r.viewport(), Viewport::new(400.0, 300.0, 2.0));
            assert!(r.render(&mut g, root).unwrap().errors.is_empty());

            r.destroy();
            assert_eq!(r.state(), RendererState::Destroyed);
            assert_eq!(r.render(&mut g, root), Err(RenderError::Destroyed));
        }
        assert_eq!(hw.as_hardware().map(|h| h.batches().len()), Some(2));
    }
}
