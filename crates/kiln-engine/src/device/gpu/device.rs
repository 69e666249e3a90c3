use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use winit::window::Window;

use crate::batch::Vertex;
use crate::device::{
    DeviceError, DeviceLimits, DrawCall, FrameStatus, GpuDevice, GpuProgram, GpuTexture,
    ProgramDevice, SurfaceErrorAction, TextureDevice, TextureUpload,
};
use crate::paint::{BlendMode, Color};
use crate::program::{FeatureSignature, ProgramUniforms, ShaderFeatures};

use super::WgpuInit;
use super::context::{CoreOptions, GpuCore, Target, create_texture};
use super::shader::{blend_state, program_source};
use super::surface::map_surface_error;

struct Program {
    signature: FeatureSignature,
    /// Indexed by [`BlendMode::index`].
    pipelines: Vec<wgpu::RenderPipeline>,
    uniforms: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    texture_layout: Option<wgpu::BindGroupLayout>,
}

struct ResidentTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct PendingDraw {
    program: GpuProgram,
    blend: BlendMode,
    textures: Option<wgpu::BindGroup>,
    indices: Range<u32>,
}

struct Frame {
    /// `None` for offscreen targets.
    surface: Option<wgpu::SurfaceTexture>,
    view: Option<wgpu::TextureView>,
    clear: Option<Color>,
}

/// Pipeline and uniform group last set on the render pass.
#[derive(Debug, Default)]
struct PassState {
    current: Option<(GpuProgram, BlendMode)>,
}

impl PassState {
    /// Records a draw's program and blend mode. Returns whether the pipeline
    /// and the uniform group need to be set again.
    fn switch(&mut self, program: GpuProgram, blend: BlendMode) -> (bool, bool) {
        let previous = self.current.replace((program, blend));
        let program_changed = previous.map(|(p, _)| p) != Some(program);
        (previous != Some((program, blend)), program_changed)
    }
}

/// Hardware device on wgpu.
///
/// Draw calls are recorded during the frame and replayed into a single render
/// pass by `end_frame`. Device loss is reported by the driver callback into a
/// shared flag; `restore` rebuilds every wgpu object against the same window.
pub struct WgpuDevice {
    window: Option<Arc<Window>>,
    init: WgpuInit,
    options: CoreOptions,
    core: Option<GpuCore>,
    /// Physical size to rebuild the core with.
    size: (u32, u32),
    destroyed: bool,
    lost: Arc<AtomicBool>,

    next_handle: u32,
    textures: FxHashMap<GpuTexture, ResidentTexture>,
    programs: FxHashMap<GpuProgram, Program>,
    bound: Option<GpuProgram>,

    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: usize,
    index_buffer: Option<wgpu::Buffer>,
    index_capacity: usize,

    frame: Option<Frame>,
    draws: Vec<PendingDraw>,
}

impl WgpuDevice {
    /// Device presenting into `window`.
    pub fn with_window(
        window: Arc<Window>,
        init: WgpuInit,
        antialias: bool,
        transparent: bool,
    ) -> Result<Self, DeviceError> {
        let size = window.inner_size();
        Self::new(Some(window), size.width, size.height, init, antialias, transparent)
    }

    /// Device rendering into an offscreen texture of `width x height` pixels.
    pub fn offscreen(width: u32, height: u32, init: WgpuInit, antialias: bool) -> Result<Self, DeviceError> {
        Self::new(None, width, height, init, antialias, false)
    }

    pub fn new(
        window: Option<Arc<Window>>,
        width: u32,
        height: u32,
        init: WgpuInit,
        antialias: bool,
        transparent: bool,
    ) -> Result<Self, DeviceError> {
        let options = CoreOptions {
            antialias,
            transparent,
        };
        let lost = Arc::new(AtomicBool::new(false));
        let core = GpuCore::new(window.clone(), width, height, &init, options, &lost)?;
        Ok(Self {
            window,
            init,
            options,
            core: Some(core),
            size: (width, height),
            destroyed: false,
            lost,
            next_handle: 0,
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            bound: None,
            vertex_buffer: None,
            vertex_capacity: 0,
            index_buffer: None,
            index_capacity: 0,
            frame: None,
            draws: Vec::new(),
        })
    }

    /// The offscreen color target, for readback. `None` when presenting to a window.
    pub fn target_texture(&self) -> Option<&wgpu::Texture> {
        match self.core.as_ref().map(|c| &c.target) {
            Some(Target::Offscreen { texture, .. }) => Some(texture),
            _ => None,
        }
    }

    fn core(&self) -> Result<&GpuCore, DeviceError> {
        match (&self.core, self.destroyed) {
            (Some(core), false) => Ok(core),
            (_, true) => Err(DeviceError::Destroyed),
            (None, false) => Err(DeviceError::Lost),
        }
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn handle(&mut self) -> u32 {
        self.next_handle = self.next_handle.wrapping_add(1);
        self.next_handle
    }

    fn ensure_geometry_capacity(&mut self, vertices: usize, indices: usize) {
        let Some(core) = self.core.as_ref() else { return };

        if vertices > self.vertex_capacity || self.vertex_buffer.is_none() {
            let cap = vertices.next_power_of_two().max(64);
            self.vertex_buffer = Some(core.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kiln vertex buffer"),
                size: (cap * std::mem::size_of::<Vertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.vertex_capacity = cap;
        }

        if indices > self.index_capacity || self.index_buffer.is_none() {
            let cap = indices.next_power_of_two().max(64);
            self.index_buffer = Some(core.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kiln index buffer"),
                size: (cap * std::mem::size_of::<u32>()) as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.index_capacity = cap;
        }
    }

    fn texture_group(&self, program: &Program, textures: &[GpuTexture]) -> Option<wgpu::BindGroup> {
        let layout = program.texture_layout.as_ref()?;
        let core = self.core.as_ref()?;

        let slots = program.signature.texture_slots as usize;
        let views: Vec<&wgpu::TextureView> = (0..slots)
            .map(|i| {
                textures
                    .get(i)
                    .and_then(|t| self.textures.get(t))
                    .map_or(&core.white, |t| &t.view)
            })
            .collect();

        let mut entries = Vec::with_capacity(slots + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Sampler(&core.sampler),
        });
        for (i, view) in views.into_iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 1,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        Some(core.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln texture bind group"),
            layout,
            entries: &entries,
        }))
    }

    fn build_program(core: &GpuCore, signature: FeatureSignature) -> Result<Program, DeviceError> {
        let device = &core.device;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kiln program"),
            source: wgpu::ShaderSource::Wgsl(program_source(signature).into()),
        });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| m.message.clone())
            .collect();
        if !errors.is_empty() {
            return Err(DeviceError::Compile(errors.join("; ")));
        }

        let texture_layout = signature
            .features
            .contains(ShaderFeatures::TEXTURED)
            .then(|| {
                let mut entries = vec![wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                }];
                for i in 0..signature.texture_slots as u32 {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: i + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    });
                }
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("kiln texture bgl"),
                    entries: &entries,
                })
            });

        let mut layouts = vec![&core.uniform_layout];
        if let Some(layout) = texture_layout.as_ref() {
            layouts.push(layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln pipeline layout"),
            bind_group_layouts: &layouts,
            immediate_size: 0,
        });

        let pipelines = BlendMode::ALL
            .iter()
            .map(|&mode| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("kiln pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &module,
                        entry_point: Some("vs_main"),
                        compilation_options: Default::default(),
                        buffers: &[Vertex::layout()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: core.format,
                            blend: Some(blend_state(mode)),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState {
                        count: core.sample_count,
                        ..Default::default()
                    },
                    multiview_mask: None,
                    cache: None,
                })
            })
            .collect();

        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kiln program uniforms"),
            size: std::mem::size_of::<ProgramUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln uniform bind group"),
            layout: &core.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        Ok(Program {
            signature,
            pipelines,
            uniforms,
            uniform_group,
            texture_layout,
        })
    }
}

impl TextureDevice for WgpuDevice {
    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> Result<GpuTexture, DeviceError> {
        if self.is_lost() {
            return Err(DeviceError::Lost);
        }
        let core = self.core()?;
        let max = core.max_texture_size();
        if upload.width > max || upload.height > max {
            return Err(DeviceError::Upload(format!(
                "`{}` is {}x{}, device maximum is {max}",
                upload.key, upload.width, upload.height
            )));
        }

        let texture = create_texture(
            &core.device,
            &core.queue,
            upload.key,
            upload.width,
            upload.height,
            upload.pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = GpuTexture(self.handle());
        self.textures.insert(
            handle,
            ResidentTexture {
                _texture: texture,
                view,
            },
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.textures.remove(&texture);
    }
}

impl ProgramDevice for WgpuDevice {
    fn compile_program(&mut self, signature: FeatureSignature) -> Result<GpuProgram, DeviceError> {
        if self.is_lost() {
            return Err(DeviceError::Lost);
        }
        let program = Self::build_program(self.core()?, signature)?;
        let handle = GpuProgram(self.handle());
        self.programs.insert(handle, program);
        log::debug!("compiled program {handle:?} for {signature:?}");
        Ok(handle)
    }

    fn bind_program(&mut self, program: GpuProgram) {
        self.bound = Some(program);
    }

    fn set_uniforms(&mut self, program: GpuProgram, uniforms: &ProgramUniforms) {
        let (Some(core), Some(p)) = (self.core.as_ref(), self.programs.get(&program)) else {
            return;
        };
        core.queue
            .write_buffer(&p.uniforms, 0, bytemuck::bytes_of(uniforms));
    }
}

impl GpuDevice for WgpuDevice {
    fn limits(&self) -> DeviceLimits {
        match self.core.as_ref() {
            Some(core) => DeviceLimits {
                max_texture_slots: core.max_texture_slots(self.init.max_texture_slots),
                max_texture_size: core.max_texture_size(),
            },
            None => DeviceLimits::default(),
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        self.core.as_ref().map_or(self.size, |c| c.size)
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if self.destroyed {
            return Err(DeviceError::Destroyed);
        }
        if let Some(core) = self.core.as_mut() {
            core.resize(width, height)?;
        }
        if width > 0 && height > 0 {
            self.size = (width, height);
        }
        Ok(())
    }

    fn begin_frame(&mut self, clear: Option<Color>) -> Result<FrameStatus, DeviceError> {
        self.draws.clear();
        self.frame = None;
        let core = self.core()?;

        let (surface, view) = match &core.target {
            Target::Offscreen { .. } => (None, None),
            Target::Surface { surface, config } => match surface.get_current_texture() {
                Ok(texture) => {
                    let view = texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    (Some(texture), Some(view))
                }
                Err(err) => {
                    log::debug!("surface error: {err:?}");
                    return match map_surface_error(surface, &core.device, config, err) {
                        SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                            Ok(FrameStatus::Skipped)
                        }
                        SurfaceErrorAction::Fatal => {
                            Err(DeviceError::Surface("out of memory".to_string()))
                        }
                    };
                }
            },
        };

        self.frame = Some(Frame {
            surface,
            view,
            clear,
        });
        Ok(FrameStatus::Ready)
    }

    fn upload_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) {
        self.ensure_geometry_capacity(vertices.len(), indices.len());
        let Some(core) = self.core.as_ref() else { return };
        if let (Some(vb), false) = (self.vertex_buffer.as_ref(), vertices.is_empty()) {
            core.queue.write_buffer(vb, 0, bytemuck::cast_slice(vertices));
        }
        if let (Some(ib), false) = (self.index_buffer.as_ref(), indices.is_empty()) {
            core.queue.write_buffer(ib, 0, bytemuck::cast_slice(indices));
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        if self.frame.is_none() {
            return;
        }
        let Some(program) = self.programs.get(&call.program) else {
            log::warn!("draw with unknown program {:?} ignored", call.program);
            return;
        };
        if self.bound != Some(call.program) {
            log::trace!("draw with program {:?} not bound", call.program);
        }
        let textures = self.texture_group(program, call.textures);
        self.draws.push(PendingDraw {
            program: call.program,
            blend: call.blend,
            textures,
            indices: call.indices.clone(),
        });
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let frame = self.frame.take();
        let draws = std::mem::take(&mut self.draws);
        if self.is_lost() {
            return Err(DeviceError::Lost);
        }
        let core = self.core()?;
        let Some(frame) = frame else { return Ok(()) };

        let target_view = match (&frame.view, &core.target) {
            (Some(view), _) => view,
            (None, Target::Offscreen { view, .. }) => view,
            (None, Target::Surface { .. }) => return Ok(()),
        };
        let (view, resolve_target) = match core.msaa.as_ref() {
            Some(msaa) => (msaa, Some(target_view)),
            None => (target_view, None),
        };
        let load = match frame.clear {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: c.r as f64,
                g: c.g as f64,
                b: c.b as f64,
                a: c.a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        let mut encoder = core
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln frame encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(vb), Some(ib)) = (self.vertex_buffer.as_ref(), self.index_buffer.as_ref()) {
                rpass.set_vertex_buffer(0, vb.slice(..));
                rpass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);

                let mut pass = PassState::default();
                for draw in &draws {
                    let Some(program) = self.programs.get(&draw.program) else { continue };
                    let Some(pipeline) = program.pipelines.get(draw.blend.index()) else {
                        continue;
                    };
                    let (pipeline_changed, program_changed) = pass.switch(draw.program, draw.blend);
                    if pipeline_changed {
                        rpass.set_pipeline(pipeline);
                    }
                    if program_changed {
                        rpass.set_bind_group(0, &program.uniform_group, &[]);
                    }
                    if let Some(group) = draw.textures.as_ref() {
                        rpass.set_bind_group(1, group, &[]);
                    }
                    rpass.draw_indexed(draw.indices.clone(), 0, 0..1);
                }
            }
        }

        core.queue.submit(std::iter::once(encoder.finish()));
        if let Some(surface) = frame.surface {
            surface.present();
        }

        if self.is_lost() {
            return Err(DeviceError::Lost);
        }
        Ok(())
    }

    fn poll_device_lost(&mut self) -> bool {
        self.is_lost()
    }

    fn restore(&mut self) -> Result<(), DeviceError> {
        if self.destroyed {
            return Err(DeviceError::Destroyed);
        }
        let (width, height) = self.size;

        self.frame = None;
        self.draws.clear();
        self.textures.clear();
        self.programs.clear();
        self.bound = None;
        self.vertex_buffer = None;
        self.vertex_capacity = 0;
        self.index_buffer = None;
        self.index_capacity = 0;
        self.core = None;

        self.lost.store(false, Ordering::Release);
        match GpuCore::new(
            self.window.clone(),
            width,
            height,
            &self.init,
            self.options,
            &self.lost,
        ) {
            Ok(core) => {
                self.core = Some(core);
                log::info!("GPU device restored");
                Ok(())
            }
            Err(err) => {
                // Keep reporting loss so the next frame retries.
                self.lost.store(true, Ordering::Release);
                Err(DeviceError::Restore(err.to_string()))
            }
        }
    }

    fn destroy(&mut self) {
        self.frame = None;
        self.draws.clear();
        self.textures.clear();
        self.programs.clear();
        self.vertex_buffer = None;
        self.index_buffer = None;
        self.core = None;
        self.destroyed = true;
    }
}
