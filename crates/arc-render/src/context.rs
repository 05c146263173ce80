//! Device, queue and swapchain ownership.

use std::sync::Arc;

use winit::window::Window;

use crate::{Error, Result};

/// The GPU context: instance, adapter, device, queue and the configured
/// surface. Owned by the main thread.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    /// True when the surface format is an sRGB variant and the present
    /// shader can skip manual gamma encoding.
    pub surface_is_srgb: bool,
}

impl GpuContext {
    /// Brings up the device and configures the swapchain at the window's
    /// current drawable size.
    ///
    /// # Errors
    ///
    /// Initialization failure is fatal to the runtime (there is no
    /// software fallback path).
    pub fn new(window: Arc<Window>, vsync: bool) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .map_err(|err| Error::Init(err.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::Init("no compatible GPU adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("arcanee-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|err| Error::Init(err.to_string()))?;

        let capabilities = surface.get_capabilities(&adapter);
        // Prefer BGRA over RGBA and sRGB over UNORM, in that order of
        // preference pairs.
        let format = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        ]
        .into_iter()
        .find(|format| capabilities.formats.contains(format))
        .or_else(|| capabilities.formats.first().copied())
        .ok_or_else(|| Error::Init("surface reports no formats".to_string()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Opaque),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            device,
            queue,
            surface,
            config,
            surface_is_srgb: format.is_srgb(),
        })
    }

    /// Reconfigures the swapchain after a resize. The console framebuffer
    /// is unaffected; only the present viewport changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquires the next backbuffer, recreating the swapchain once on
    /// loss. A second failure is surfaced as a device error.
    pub fn acquire(&mut self) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|err| Error::Device(err.to_string()))
            }
            Err(err) => Err(Error::Device(err.to_string())),
        }
    }
}
