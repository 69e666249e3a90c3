use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use winit::window::Window;

use crate::device::DeviceError;

use super::WgpuInit;
use super::surface::{apply_resize, choose_alpha_mode, choose_surface_format};

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub(super) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where frames go.
pub(super) enum Target {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// Options the core needs beyond [`WgpuInit`].
#[derive(Debug, Copy, Clone)]
pub(super) struct CoreOptions {
    pub antialias: bool,
    pub transparent: bool,
}

/// wgpu objects that die together when the device is lost.
///
/// Rebuilt from scratch on restore; the window (if any) outlives every core.
pub(super) struct GpuCore {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub target: Target,
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
    pub sample_count: u32,
    /// Multisampled color target, resolved into the frame view.
    pub msaa: Option<wgpu::TextureView>,
    pub sampler: wgpu::Sampler,
    pub uniform_layout: wgpu::BindGroupLayout,
    /// 1x1 white texture used to fill unused slots.
    pub white: wgpu::TextureView,
}

impl GpuCore {
    /// Creates a core bound to `window`, or an offscreen target when `window` is `None`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
    pub fn new(
        window: Option<Arc<Window>>,
        width: u32,
        height: u32,
        init: &WgpuInit,
        options: CoreOptions,
        lost: &Arc<AtomicBool>,
    ) -> Result<Self, DeviceError> {
        pollster::block_on(Self::new_async(window, width, height, init, options, lost))
    }

    async fn new_async(
        window: Option<Arc<Window>>,
        width: u32,
        height: u32,
        init: &WgpuInit,
        options: CoreOptions,
        lost: &Arc<AtomicBool>,
    ) -> Result<Self, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::Surface("target has zero size".to_string()));
        }

        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = match window {
            Some(window) => Some(
                instance
                    .create_surface(window)
                    .map_err(|e| DeviceError::Surface(e.to_string()))?,
            ),
            None => None,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| DeviceError::NoAdapter(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("kiln device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| DeviceError::RequestDevice(e.to_string()))?;

        check_target_size(width, height, device.limits().max_texture_dimension_2d)?;

        let flag = Arc::clone(lost);
        device.set_device_lost_callback(move |reason, message| {
            if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                return;
            }
            log::error!("GPU device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });

        let info = adapter.get_info();
        log::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

        let (target, format) = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = choose_surface_format(&caps, init.prefer_srgb)
                    .ok_or_else(|| DeviceError::Surface("no supported surface formats".to_string()))?;
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width,
                    height,
                    present_mode: init.present_mode,
                    alpha_mode: choose_alpha_mode(&caps, init.alpha_mode, options.transparent),
                    view_formats: vec![],
                    desired_maximum_frame_latency: init.desired_maximum_frame_latency,
                };
                surface.configure(&device, &config);
                (Target::Surface { surface, config }, format)
            }
            None => {
                let (texture, view) = offscreen_target(&device, width, height);
                (Target::Offscreen { texture, view }, OFFSCREEN_FORMAT)
            }
        };

        let sample_count = if options.antialias
            && adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(4)
        {
            4
        } else {
            1
        };
        let msaa = (sample_count > 1).then(|| msaa_target(&device, format, width, height, sample_count));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let white = create_texture(&device, &queue, "kiln white", 1, 1, &[255; 4]);
        let white = white.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!("gpu core ready: {width}x{height} {format:?}, {sample_count}x msaa");
        Ok(Self {
            adapter,
            device,
            queue,
            target,
            format,
            size: (width, height),
            sample_count,
            msaa,
            sampler,
            uniform_layout,
            white,
        })
    }

    /// Textures one draw call may sample, capped by the adapter.
    pub fn max_texture_slots(&self, wanted: u8) -> u8 {
        let adapter = self.adapter.limits().max_sampled_textures_per_shader_stage;
        (wanted as u32).min(adapter).clamp(1, u8::MAX as u32) as u8
    }

    pub fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if width == 0 || height == 0 || (width, height) == self.size {
            return Ok(());
        }
        check_target_size(width, height, self.max_texture_size())?;
        self.size = (width, height);

        match &mut self.target {
            Target::Surface { surface, config } => {
                apply_resize(surface, &self.device, config, width, height);
            }
            Target::Offscreen { texture, view } => {
                let (t, v) = offscreen_target(&self.device, width, height);
                *texture = t;
                *view = v;
            }
        }
        if self.sample_count > 1 {
            self.msaa = Some(msaa_target(
                &self.device,
                self.format,
                width,
                height,
                self.sample_count,
            ));
        }
        Ok(())
    }
}

/// Surface, offscreen and MSAA targets are all textures of the frame size.
fn check_target_size(width: u32, height: u32, max: u32) -> Result<(), DeviceError> {
    if width > max || height > max {
        return Err(DeviceError::TargetTooLarge { width, height, max });
    }
    Ok(())
}

pub(super) fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture
}

fn offscreen_target(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("kiln offscreen target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn msaa_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    sample_count: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln msaa target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_is_checked_per_edge() {
        assert!(check_target_size(8192, 8192, 8192).is_ok());
        assert_eq!(
            check_target_size(10000, 600, 8192),
            Err(DeviceError::TargetTooLarge {
                width: 10000,
                height: 600,
                max: 8192
            })
        );
        assert!(check_target_size(600, 8193, 8192).is_err());
    }
}
