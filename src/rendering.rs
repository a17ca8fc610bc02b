//! Rendering system with wgpu pipeline and the voice-circle shader.

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use winit::window::Window;

use crate::audio::SpectrumBands;
use crate::error::{DriftError, Result};
use crate::instrument::{InstrumentSnapshot, VoiceView};
use crate::params::{DisplayConfig, MAX_VOICES};

/// Uniform buffer for the circle shader
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CircleUniforms {
    /// Centre x, centre y, radius (logical px), halo fraction
    pub circles: [[f32; 4]; MAX_VOICES],
    /// Linear RGB fill, alpha = 1 when sounding
    pub colors: [[f32; 4]; MAX_VOICES],
    pub background: [f32; 4],
    /// Surface size in physical pixels
    pub resolution: [f32; 2],
    /// Physical pixels per logical pixel
    pub scale: f32,
    pub count: u32,
}

/// Fill colour of a voice as 8-bit sRGB.
///
/// Sounding voices slide from blue-violet to red as their entropy grows.
pub fn voice_color(view: &VoiceView, display: &DisplayConfig) -> [u8; 3] {
    if !view.active {
        return display.inactive_color;
    }
    let entropy = view.entropy.clamp(0.0, 1.0);
    let r = (100.0 + entropy * 155.0) as u8;
    [r, 0, 255 - r]
}

/// sRGB component (0..=255) to linear light
pub fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn to_shader_color(rgb: [u8; 3], linear: bool, alpha: f32) -> [f32; 4] {
    let channel = |c: u8| {
        if linear {
            srgb_to_linear(c)
        } else {
            c as f32 / 255.0
        }
    };
    [channel(rgb[0]), channel(rgb[1]), channel(rgb[2]), alpha]
}

/// Build the shader uniforms for one frame
pub fn build_uniforms(
    snapshot: &InstrumentSnapshot,
    spectrum: &SpectrumBands,
    display: &DisplayConfig,
    surface_size: (u32, u32),
    scale: f32,
    linear_output: bool,
) -> CircleUniforms {
    let mut uniforms = CircleUniforms::zeroed();
    let halo = spectrum.entropy.clamp(0.0, 1.0) * display.halo_gain;

    for (i, view) in snapshot.voices.iter().take(MAX_VOICES).enumerate() {
        let (x, y) = display.circle_center(i);
        uniforms.circles[i] = [x, y, display.circle_radius_px, halo];
        let alpha = if view.active { 1.0 } else { 0.0 };
        uniforms.colors[i] = to_shader_color(voice_color(view, display), linear_output, alpha);
    }

    uniforms.count = snapshot.voices.len().min(MAX_VOICES) as u32;
    uniforms.background = to_shader_color(display.background, linear_output, 1.0);
    uniforms.resolution = [surface_size.0 as f32, surface_size.1 as f32];
    uniforms.scale = scale;
    uniforms
}

/// Rendering system managing wgpu device, pipeline, and uniforms
pub struct RenderSystem {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl RenderSystem {
    /// Create new rendering system
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        // Create wgpu instance
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create surface (window must have 'static lifetime via Arc)
        let surface = instance
            .create_surface(window)
            .map_err(|e| DriftError::Gpu(format!("Failed to create surface: {}", e)))?;

        // Request adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DriftError::Gpu("Failed to find suitable GPU adapter".to_string()))?;

        // Request device
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| DriftError::Gpu(format!("Failed to request device: {}", e)))?;

        // Configure surface
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| DriftError::Gpu("Surface reports no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        // Load shader
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Circle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("circles.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Circle Uniform Buffer"),
            size: std::mem::size_of::<CircleUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Circle Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Circle Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Circle Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Circle Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
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
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        tracing::info!("Display: {:?} surface, {}x{}", surface_format, config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    /// Whether colours must be given in linear light
    pub fn is_srgb(&self) -> bool {
        self.config.format.is_srgb()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface after a window resize
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Update circle uniforms
    pub fn update_uniforms(&self, uniforms: &CircleUniforms) {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    /// Render a frame
    pub fn render(&self) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
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

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Fullscreen triangle
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
