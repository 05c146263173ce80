//! Frame orchestration: the fixed pass order and the present pass.

use std::sync::Arc;

use arc_cartridge::ScalingMode;
use winit::window::Window;

use crate::canvas_layer::CanvasLayer;
use crate::cbuf::ConsoleTarget;
use crate::context::GpuContext;
use crate::mesh_pass::{DrawItem, MeshPass, SceneUniforms};
use crate::present::{compute_viewport, Viewport};
use crate::shaders;
use crate::{Error, Result};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PresentParams {
    viewport: [f32; 4],
    flags: [u32; 4],
}

/// Everything one frame hands the renderer. Pass order is fixed and not
/// configurable by cartridges: 3D, then 2D composite, then present.
pub struct FrameInputs<'a> {
    /// `Some` when the script requested a 3D render this frame; the
    /// console framebuffer is cleared as part of the 3D pass.
    pub scene: Option<ScenePass<'a>>,
    /// Rasterized canvas pixels (premultiplied RGBA at console size).
    pub canvas_pixels: Option<&'a [u8]>,
}

pub struct ScenePass<'a> {
    pub uniforms: SceneUniforms,
    pub opaque: Vec<DrawItem<'a>>,
    /// Pre-sorted back-to-front by view-space depth.
    pub blended: Vec<DrawItem<'a>>,
}

pub struct Renderer {
    pub context: GpuContext,
    console: ConsoleTarget,
    canvas_layer: CanvasLayer,
    pub mesh_pass: MeshPass,
    scaling_mode: ScalingMode,
    viewport: Viewport,

    present_layout: wgpu::BindGroupLayout,
    present_pipeline: wgpu::RenderPipeline,
    present_params: wgpu::Buffer,
    sampler_nearest: wgpu::Sampler,
    sampler_linear: wgpu::Sampler,
    present_bind_nearest: wgpu::BindGroup,
    present_bind_linear: wgpu::BindGroup,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        vsync: bool,
        console_size: (u32, u32),
        scaling_mode: ScalingMode,
    ) -> Result<Self> {
        let context = GpuContext::new(window, vsync)?;
        let console = ConsoleTarget::new(&context.device, console_size.0, console_size.1);
        let canvas_layer = CanvasLayer::new(&context.device, console_size.0, console_size.1);
        let mesh_pass = MeshPass::new(&context.device, &context.queue);

        let device = &context.device;
        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::PRESENT.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present-pipeline-layout"),
            bind_group_layouts: &[&present_layout],
            push_constant_ranges: &[],
        });
        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("present-pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: context.config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let present_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("present-params"),
            size: std::mem::size_of::<PresentParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler_nearest = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present-nearest"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..wgpu::SamplerDescriptor::default()
        });
        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present-linear"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..wgpu::SamplerDescriptor::default()
        });
        let present_bind_nearest = Self::make_present_bind(
            device,
            &present_layout,
            &console.color_view,
            &sampler_nearest,
            &present_params,
        );
        let present_bind_linear = Self::make_present_bind(
            device,
            &present_layout,
            &console.color_view,
            &sampler_linear,
            &present_params,
        );

        let viewport = compute_viewport(
            scaling_mode,
            context.config.width,
            context.config.height,
            console.width,
            console.height,
        );

        Ok(Self {
            context,
            console,
            canvas_layer,
            mesh_pass,
            scaling_mode,
            viewport,
            present_layout,
            present_pipeline,
            present_params,
            sampler_nearest,
            sampler_linear,
            present_bind_nearest,
            present_bind_linear,
        })
    }

    fn make_present_bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        params: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present-bind"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        })
    }

    /// Window resize: swapchain + viewport only. The console framebuffer
    /// never follows the window.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
        self.recompute_viewport();
    }

    /// Preset or aspect switch: rebuild the console-sized resources.
    pub fn set_console_size(&mut self, width: u32, height: u32) {
        self.console = ConsoleTarget::new(&self.context.device, width, height);
        self.canvas_layer.resize(&self.context.device, width, height);
        self.present_bind_nearest = Self::make_present_bind(
            &self.context.device,
            &self.present_layout,
            &self.console.color_view,
            &self.sampler_nearest,
            &self.present_params,
        );
        self.present_bind_linear = Self::make_present_bind(
            &self.context.device,
            &self.present_layout,
            &self.console.color_view,
            &self.sampler_linear,
            &self.present_params,
        );
        self.recompute_viewport();
    }

    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        self.scaling_mode = mode;
        self.recompute_viewport();
    }

    pub fn scaling_mode(&self) -> ScalingMode {
        self.scaling_mode
    }

    pub fn console_size(&self) -> (u32, u32) {
        (self.console.width, self.console.height)
    }

    pub fn console_aspect(&self) -> f32 {
        self.console.aspect()
    }

    pub fn drawable_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    /// The viewport of the most recent frame, for mouse mapping.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn recompute_viewport(&mut self) {
        self.viewport = compute_viewport(
            self.scaling_mode,
            self.context.config.width,
            self.context.config.height,
            self.console.width,
            self.console.height,
        );
    }

    /// Executes the fixed pass order and presents.
    pub fn render_frame(&mut self, frame: FrameInputs<'_>) -> Result<()> {
        let backbuffer = self.context.acquire()?;
        let backbuffer_view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame-encoder"),
                });

        // Pass 1: 3D into the console framebuffer (cleared only when a
        // render was requested; otherwise the previous contents persist).
        if let Some(scene) = &frame.scene {
            self.mesh_pass.record(
                &self.context.device,
                &self.context.queue,
                &mut encoder,
                &self.console,
                &scene.uniforms,
                &scene.opaque,
                &scene.blended,
            );
        }

        // Pass 2: 2D composite over the console framebuffer.
        if let Some(pixels) = frame.canvas_pixels {
            self.canvas_layer.upload_and_composite(
                &self.context.queue,
                &mut encoder,
                &self.console,
                pixels,
            );
        }

        // Pass 3: present scale to the backbuffer.
        self.recompute_viewport();
        let params = PresentParams {
            viewport: [
                self.viewport.x as f32,
                self.viewport.y as f32,
                self.viewport.w.max(1) as f32,
                self.viewport.h.max(1) as f32,
            ],
            flags: [u32::from(!self.context.surface_is_srgb), 0, 0, 0],
        };
        self.context
            .queue
            .write_buffer(&self.present_params, 0, bytemuck::bytes_of(&params));

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &backbuffer_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.present_pipeline);
            let bind = if self.viewport.wants_nearest() {
                &self.present_bind_nearest
            } else {
                &self.present_bind_linear
            };
            pass.set_bind_group(0, bind, &[]);
            pass.draw(0..3, 0..1);
        }

        self.context.queue.submit([encoder.finish()]);
        backbuffer.present();
        Ok(())
    }

    /// Blocking readback of the console framebuffer as tightly packed
    /// RGBA8 rows. Dev-mode frame capture.
    pub fn capture_console(&self) -> Result<Vec<u8>> {
        let (width, height) = (self.console.width, self.console.height);
        let padded_row = (width * 4 + 255) & !255;
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture-buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("capture-encoder"),
                });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.console.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| Error::Device("capture mapping dropped".to_string()))?
            .map_err(|err| Error::Device(err.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for row in 0..height {
            let start = (row * padded_row) as usize;
            pixels.extend_from_slice(&data[start..start + (width * 4) as usize]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }
}
