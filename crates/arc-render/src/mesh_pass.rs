//! Forward 3D pass into the console framebuffer.

use arc_scene::{AlphaMode, Material, Mesh, TextureData};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::cbuf::{ConsoleTarget, COLOR_FORMAT, DEPTH_FORMAT};
use crate::shaders;

pub const MAX_LIGHTS: usize = 8;

/// Per-draw uniform block, padded to the dynamic-offset alignment.
pub const DRAW_UNIFORM_STRIDE: u64 = 256;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    /// xyz = position; w = kind (0 directional, 1 point, 2 spot).
    pub position: [f32; 4],
    /// xyz = direction; w = range.
    pub direction: [f32; 4],
    /// rgb = color * intensity; w = cos(inner).
    pub color: [f32; 4],
    /// x = cos(outer).
    pub params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    ambient: [f32; 4],
    counts: [u32; 4],
    lights: [GpuLight; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    base_color: [f32; 4],
    factors: [f32; 4],
    emissive: [f32; 4],
    /// Pads the block to [`DRAW_UNIFORM_STRIDE`].
    _pad: [f32; 36],
}

/// A mesh uploaded to the GPU: interleaved vertices plus indices.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    pub byte_size: u64,
}

/// A texture uploaded to the GPU with its color-space baked into the
/// format (sRGB roles use an sRGB view format).
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub byte_size: u64,
}

/// A material's GPU form: factor block plus its texture bind group.
pub struct GpuMaterial {
    pub factors: Material,
    bind_group: wgpu::BindGroup,
}

/// Camera, lights and environment for one frame's 3D pass.
pub struct SceneUniforms {
    pub view: Mat4,
    pub proj: Mat4,
    pub eye: Vec3,
    pub ambient: Vec3,
    pub tonemap: bool,
    pub lights: Vec<GpuLight>,
}

/// One draw: world matrix, mesh and material.
pub struct DrawItem<'a> {
    pub model: Mat4,
    pub mesh: &'a GpuMesh,
    pub material: &'a GpuMaterial,
}

pub struct MeshPass {
    globals_buffer: wgpu::Buffer,
    globals_bind: wgpu::BindGroup,
    draw_buffer: wgpu::Buffer,
    draw_capacity: u64,
    draw_bind: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    material_sampler: wgpu::Sampler,
    white: GpuTexture,
    /// [opaque, blend] x [cull, no-cull].
    pipelines: [[wgpu::RenderPipeline; 2]; 2],
}

impl MeshPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh-globals-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh-draw-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mesh-material-layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh-globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh-globals-bind"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let draw_capacity = 256;
        let draw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh-draw-uniforms"),
            size: draw_capacity * DRAW_UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let draw_bind = Self::make_draw_bind(device, &draw_layout, &draw_buffer);

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..wgpu::SamplerDescriptor::default()
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::MESH.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &draw_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |blended: bool, cull: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mesh-pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 48,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![
                            0 => Float32x3,
                            1 => Float32x3,
                            2 => Float32x4,
                            3 => Float32x2,
                        ],
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: if blended {
                            Some(wgpu::BlendState::ALPHA_BLENDING)
                        } else {
                            None
                        },
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: cull.then_some(wgpu::Face::Back),
                    ..wgpu::PrimitiveState::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: !blended,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };
        let pipelines = [
            [make_pipeline(false, true), make_pipeline(false, false)],
            [make_pipeline(true, true), make_pipeline(true, false)],
        ];

        let white = upload_texture_data(device, queue, &TextureData::white());

        Self {
            globals_buffer,
            globals_bind,
            draw_buffer,
            draw_capacity,
            draw_bind,
            draw_layout,
            material_layout,
            material_sampler,
            white,
            pipelines,
        }
    }

    fn make_draw_bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh-draw-bind"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        })
    }

    pub fn upload_mesh(&self, device: &wgpu::Device, mesh: &Mesh) -> GpuMesh {
        let mut vertices: Vec<f32> = Vec::with_capacity(mesh.vertex_count() * 12);
        for index in 0..mesh.vertex_count() {
            vertices.extend_from_slice(&mesh.positions[index]);
            vertices.extend_from_slice(&mesh.normals[index]);
            vertices.extend_from_slice(&mesh.tangents[index]);
            vertices.extend_from_slice(&mesh.uvs[index]);
        }
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh-vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh-indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            byte_size: (vertices.len() * 4 + mesh.indices.len() * 4) as u64,
        }
    }

    pub fn upload_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &TextureData,
    ) -> GpuTexture {
        upload_texture_data(device, queue, data)
    }

    /// Builds a material's bind group; `resolve` maps raw texture handle
    /// values to uploaded textures, falling back to the white placeholder.
    pub fn build_material<'a>(
        &'a self,
        device: &wgpu::Device,
        factors: Material,
        mut resolve: impl FnMut(i64) -> Option<&'a GpuTexture>,
    ) -> GpuMaterial {
        let textures = factors.textures;
        let views: Vec<&wgpu::TextureView> = [
            textures.base_color,
            textures.metallic_roughness,
            textures.normal,
            textures.emissive,
            textures.occlusion,
        ]
        .into_iter()
        .map(|handle| {
            if handle == 0 {
                &self.white.view
            } else {
                resolve(handle).map_or(&self.white.view, |texture| &texture.view)
            }
        })
        .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material-bind"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(views[4]),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
        });
        GpuMaterial {
            factors,
            bind_group,
        }
    }

    /// Records the 3D pass: clear, opaque draws in list order, then
    /// blended draws (the caller sorted them back-to-front).
    pub fn record(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        console: &ConsoleTarget,
        uniforms: &SceneUniforms,
        opaque: &[DrawItem<'_>],
        blended: &[DrawItem<'_>],
    ) {
        let mut lights = [GpuLight {
            position: [0.0; 4],
            direction: [0.0; 4],
            color: [0.0; 4],
            params: [0.0; 4],
        }; MAX_LIGHTS];
        let count = uniforms.lights.len().min(MAX_LIGHTS);
        lights[..count].copy_from_slice(&uniforms.lights[..count]);

        let globals = Globals {
            view_proj: (uniforms.proj * uniforms.view).to_cols_array_2d(),
            eye: uniforms.eye.extend(1.0).to_array(),
            ambient: uniforms.ambient.extend(1.0).to_array(),
            counts: [count as u32, u32::from(uniforms.tonemap), 0, 0],
            lights,
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));

        // Grow the per-draw uniform buffer if the frame needs it.
        let total = (opaque.len() + blended.len()) as u64;
        if total > self.draw_capacity {
            self.draw_capacity = total.next_power_of_two();
            self.draw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mesh-draw-uniforms"),
                size: self.draw_capacity * DRAW_UNIFORM_STRIDE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.draw_bind = Self::make_draw_bind(device, &self.draw_layout, &self.draw_buffer);
        }
        let mut staged = vec![0_u8; (total * DRAW_UNIFORM_STRIDE) as usize];
        for (slot, item) in opaque.iter().chain(blended.iter()).enumerate() {
            let factors = &item.material.factors;
            let cutoff = match factors.alpha_mode {
                AlphaMode::Mask { cutoff } => cutoff,
                _ => -1.0,
            };
            let block = DrawUniforms {
                model: item.model.to_cols_array_2d(),
                base_color: factors.base_color_factor.to_array(),
                factors: [
                    factors.metallic_factor,
                    factors.roughness_factor,
                    factors.normal_scale,
                    factors.occlusion_strength,
                ],
                emissive: [
                    factors.emissive_factor.x,
                    factors.emissive_factor.y,
                    factors.emissive_factor.z,
                    cutoff,
                ],
                _pad: [0.0; 36],
            };
            let offset = slot * DRAW_UNIFORM_STRIDE as usize;
            staged[offset..offset + std::mem::size_of::<DrawUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&block));
        }
        if !staged.is_empty() {
            queue.write_buffer(&self.draw_buffer, 0, &staged);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("mesh-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &console.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &console.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, &self.globals_bind, &[]);

        for (index, item) in opaque.iter().enumerate() {
            self.draw_one(&mut pass, item, index as u64, false);
        }
        for (index, item) in blended.iter().enumerate() {
            self.draw_one(&mut pass, item, (opaque.len() + index) as u64, true);
        }
    }

    #[allow(clippy::needless_lifetimes)]
    fn draw_one<'p>(
        &'p self,
        pass: &mut wgpu::RenderPass<'p>,
        item: &DrawItem<'p>,
        slot: u64,
        blended: bool,
    ) {
        let cull_index = if item.material.factors.double_sided { 1 } else { 0 };
        let blend_index = usize::from(blended);
        pass.set_pipeline(&self.pipelines[blend_index][cull_index]);
        pass.set_bind_group(1, &self.draw_bind, &[(slot * DRAW_UNIFORM_STRIDE) as u32]);
        pass.set_bind_group(2, &item.material.bind_group, &[]);
        pass.set_vertex_buffer(0, item.mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(item.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..item.mesh.index_count, 0, 0..1);
    }
}

fn upload_texture_data(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &TextureData,
) -> GpuTexture {
    let format = if data.srgb {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };
    let size = wgpu::Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("material-texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data.rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(data.width * 4),
            rows_per_image: Some(data.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        byte_size: data.byte_size(),
    }
}
