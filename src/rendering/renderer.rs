use std::sync::Arc;

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::{Camera, CameraUniform};
use crate::rendering::grid::GridRenderer;
use crate::rendering::imgui_renderer::ImguiRendererState;
use crate::rendering::instance::{Instance, InstanceBuffer, INSTANCE_VBL};
use crate::rendering::render_model::{MaterialResources, RenderModel, RENDER_MODEL_VBL};
use crate::rendering::texture::DepthTexture;
use crate::rendering::{Rect, RenderSurface};
use crate::scene_graph::{DirectionalLight, Lighting, Scene};

const EXPOSURE: f32 = 1.2;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct LightUniform {
    direction: Vec4,
    color: Vec4,
}

impl LightUniform {
    fn new(light: &DirectionalLight) -> Self {
        Self {
            direction: light.direction().extend(0.0),
            color: (srgb_to_linear(light.color) * light.intensity).extend(1.0),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct LightingUniform {
    ambient: Vec4,
    lights: [LightUniform; 3],
    params: Vec4,
}

impl LightingUniform {
    fn new(lighting: &Lighting) -> Self {
        Self {
            ambient: (srgb_to_linear(lighting.ambient_color) * lighting.ambient_intensity).extend(1.0),
            lights: [
                LightUniform::new(&lighting.key),
                LightUniform::new(&lighting.rim),
                LightUniform::new(&lighting.fill),
            ],
            params: Vec4::new(EXPOSURE, 0.0, 0.0, 0.0),
        }
    }
}

pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    let channel = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

/// Maps a rectangle in logical surface coordinates onto a physical target,
/// clamped to its bounds.
pub fn scale_rect(rect: Rect, logical: (u32, u32), physical: (u32, u32)) -> Rect {
    let sx = physical.0 as f32 / logical.0.max(1) as f32;
    let sy = physical.1 as f32 / logical.1.max(1) as f32;

    let x = ((rect.x as f32 * sx).round() as u32).min(physical.0);
    let y = ((rect.y as f32 * sy).round() as u32).min(physical.1);
    let right = ((rect.right() as f32 * sx).round() as u32).min(physical.0);
    let bottom = (((rect.y + rect.height) as f32 * sy).round() as u32).min(physical.1);

    Rect::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
}

struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    cleared: bool,
    prepared: bool,
}

pub struct Renderer {
    pub window: Arc<Window>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: DepthTexture,
    imgui: ImguiRendererState,

    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    lighting_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,

    materials: MaterialResources,
    mesh_pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: Option<wgpu::RenderPipeline>,
    grid: GridRenderer,
    instance_buffer: InstanceBuffer,
    instances: Vec<Instance>,
    render_model: Option<RenderModel>,

    logical_size: (u32, u32),
    viewport: Rect,
    scissor: Rect,
    scissor_test: bool,
    clear_alpha: f32,
    frame: Option<Frame>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, imgui_context: &mut imgui::Context) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;

        let line_mode = adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if line_mode {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            log::warn!("Adapter has no line polygon mode, wireframe is unavailable");
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features,
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .context("Surface reports no formats")?;

        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .find(|mode| **mode == wgpu::CompositeAlphaMode::PreMultiplied)
            .or(surface_caps.alpha_modes.first())
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_texture = DepthTexture::new(&device, surface_config.width, surface_config.height, "Depth Texture");
        let imgui = ImguiRendererState::new(&device, &queue, surface_format, imgui_context);

        let camera_uniform = CameraUniform::default();
        let camera_buffer = camera_uniform.create_buffer(&device);
        let lighting_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lighting Uniform Buffer"),
            size: std::mem::size_of::<LightingUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
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

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame bind group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
        });

        let materials = MaterialResources::new(&device, &queue);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/mesh.wgsl").into()),
        });
        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh pipeline layout"),
            bind_group_layouts: &[&frame_layout, &materials.layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = create_mesh_pipeline(
            &device,
            &mesh_layout,
            &shader,
            surface_format,
            wgpu::PolygonMode::Fill,
        );
        let wireframe_pipeline = line_mode.then(|| {
            create_mesh_pipeline(
                &device,
                &mesh_layout,
                &shader,
                surface_format,
                wgpu::PolygonMode::Line,
            )
        });

        let grid = GridRenderer::new(&device, &frame_layout, surface_format);
        let instance_buffer = InstanceBuffer::new(&device, "Scene");

        let logical_size = (surface_config.width, surface_config.height);
        Ok(Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            depth_texture,
            imgui,
            camera_uniform,
            camera_buffer,
            lighting_buffer,
            frame_bind_group,
            materials,
            mesh_pipeline,
            wireframe_pipeline,
            grid,
            instance_buffer,
            instances: Vec::new(),
            render_model: None,
            logical_size,
            viewport: Rect::full(logical_size.0, logical_size.1),
            scissor: Rect::full(logical_size.0, logical_size.1),
            scissor_test: false,
            clear_alpha: 1.0,
            frame: None,
        })
    }

    pub fn physical_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.surface_config.width, self.surface_config.height)
    }

    pub fn supports_wireframe(&self) -> bool {
        self.wireframe_pipeline.is_some()
    }

    /// Reconfigures the swapchain. The logical size is left to the viewer.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_texture.resize(&self.device, new_size.width, new_size.height);
    }

    pub fn begin_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.frame = Some(Frame {
            output,
            view,
            cleared: false,
            prepared: false,
        });
        Ok(())
    }

    /// Draws the control panel and presents.
    pub fn finish_frame(&mut self, imgui_context: &mut imgui::Context) {
        let Some(mut frame) = self.frame.take() else {
            return;
        };

        if !frame.cleared {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Clear encoder"),
                });
            drop(self.begin_scene_pass(&mut encoder, &mut frame, wgpu::Color::BLACK));
            self.queue.submit([encoder.finish()]);
        }

        let overlay = self
            .imgui
            .render(&frame.view, imgui_context, &self.device, &self.queue);
        self.queue.submit([overlay]);

        frame.output.present();
    }

    fn target_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn sync_model(&mut self, scene: &Scene) {
        let Some(model) = scene.model() else {
            self.render_model = None;
            self.instances.clear();
            return;
        };

        if self.render_model.as_ref().map(RenderModel::model_id) != Some(model.id()) {
            self.render_model = Some(RenderModel::from_model(
                &self.device,
                &self.queue,
                &self.materials,
                model,
            ));
        }

        if let Some(render_model) = self.render_model.as_mut() {
            render_model.prepare(&self.queue, model, &mut self.instances);
            self.instance_buffer
                .write(&self.device, &self.queue, &self.instances);
        }
    }

    fn begin_scene_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        frame: &mut Frame,
        clear_color: wgpu::Color,
    ) -> wgpu::RenderPass<'e> {
        let load = if frame.cleared {
            wgpu::LoadOp::Load
        } else {
            wgpu::LoadOp::Clear(clear_color)
        };
        frame.cleared = true;

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.depth_texture.view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    fn clear_color(&self, scene: &Scene) -> wgpu::Color {
        let background = scene.background.map(srgb_to_linear).unwrap_or(Vec3::ZERO);
        wgpu::Color {
            r: background.x as f64,
            g: background.y as f64,
            b: background.z as f64,
            a: self.clear_alpha as f64,
        }
    }
}

impl RenderSurface for Renderer {
    fn size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width.max(1), height.max(1));
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    fn set_scissor(&mut self, scissor: Rect) {
        self.scissor = scissor;
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
    }

    fn scissor_test(&self) -> bool {
        self.scissor_test
    }

    fn set_clear_alpha(&mut self, alpha: f32) {
        self.clear_alpha = alpha.clamp(0.0, 1.0);
    }

    fn clear_alpha(&self) -> f32 {
        self.clear_alpha
    }

    fn render(&mut self, scene: &Scene, camera: &Camera) {
        let Some(mut frame) = self.frame.take() else {
            log::warn!("render called outside of a frame");
            return;
        };

        if !frame.prepared {
            self.sync_model(scene);
            frame.prepared = true;
        }

        self.camera_uniform.update(camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.camera_buffer);
        self.queue.write_buffer(
            &self.lighting_buffer,
            0,
            bytemuck::bytes_of(&LightingUniform::new(&scene.lighting)),
        );

        let target = self.target_size();
        let viewport = scale_rect(self.viewport, self.logical_size, target);
        let scissor = if self.scissor_test {
            scale_rect(self.scissor, self.logical_size, target)
        } else {
            Rect::full(target.0, target.1)
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        if viewport.width > 0 && viewport.height > 0 && scissor.width > 0 && scissor.height > 0 {
            let clear_color = self.clear_color(scene);
            let mut render_pass = self.begin_scene_pass(&mut encoder, &mut frame, clear_color);

            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

            if scene.grid_visible {
                self.grid.draw(&mut render_pass);
            }

            if let Some(render_model) = &self.render_model {
                let pipeline = match (&self.wireframe_pipeline, scene.wireframe) {
                    (Some(wireframe), true) => wireframe,
                    _ => &self.mesh_pipeline,
                };
                render_pass.set_pipeline(pipeline);
                self.instance_buffer.bind(&mut render_pass);
                render_model.draw(&mut render_pass);
            }
        }

        self.queue.submit([encoder.finish()]);
        self.frame = Some(frame);
    }
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    polygon_mode: wgpu::PolygonMode,
) -> wgpu::RenderPipeline {
    let (label, fragment_entry) = match polygon_mode {
        wgpu::PolygonMode::Fill => ("Mesh pipeline", "fs_main"),
        _ => ("Wireframe pipeline", "fs_wireframe"),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[RENDER_MODEL_VBL, INSTANCE_VBL],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthTexture::DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
