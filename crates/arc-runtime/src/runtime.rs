//! The windowed frame loop.

use std::path::{Path, PathBuf};

use arc_core::CartridgeId;
use arc_input::InputSystem;
use arc_registry::Handle;
use arc_render::{DrawItem, FrameInputs, GpuLight, Renderer, ScenePass, SceneUniforms};
use arc_scene::{CameraView, LightKind, Scene};
use arc_tracing::{debug, info, warn};
use arc_vfs::{ArchiveMount, CartMount, DiskMount};
use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::cartridge::{CartridgeHandle, LoadedCartridge};
use crate::platform::Platform;
use crate::resources::CartridgeResources;
use crate::services::Services;
use crate::{Error, Result};

/// How the host runs a cartridge: window, renderer, loop.
pub struct Runtime {
    platform: Platform,
    cartridge: LoadedCartridge,
    cart_path: PathBuf,
    user_data_root: PathBuf,
    tick_hz: u32,
    dev_mode: bool,
}

impl Runtime {
    /// Brings up the window, the GPU and the first cartridge load.
    pub fn new(settings: &arc_config::HostSettings, cart_path: &Path) -> Result<Self> {
        let platform = Platform::new(&settings.window)?;
        let user_data_root = settings
            .user_data_root
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("arcanee")))
            .unwrap_or_else(|| PathBuf::from(".arcanee"));

        // The renderer needs the console size, which needs the manifest;
        // start with a placeholder size and let the load fix it up.
        let renderer = Renderer::new(
            platform.window(),
            platform.vsync(),
            (480, 270),
            arc_cartridge::ScalingMode::Fit,
        )?;

        let input = InputSystem::new(0.15, 0.05);
        let cartridge = LoadedCartridge::load(
            open_cart(cart_path)?,
            &user_data_root,
            settings.tick_hz,
            settings.dev_mode,
            CartridgeHandle {
                renderer: Some(renderer),
                input,
            },
        )?;

        Ok(Self {
            platform,
            cartridge,
            cart_path: cart_path.to_path_buf(),
            user_data_root,
            tick_hz: settings.tick_hz,
            dev_mode: settings.dev_mode,
        })
    }

    /// Runs until the window closes or the cartridge stops.
    pub fn run(mut self) -> Result<()> {
        loop {
            if !self.frame()? {
                break;
            }
        }
        let _ = self.cartridge.stop();
        info!("runtime exiting");
        Ok(())
    }

    /// One host frame. Returns `false` when the loop should end.
    pub fn frame(&mut self) -> Result<bool> {
        // 1. Pump platform events into the current input state.
        let requests = {
            let services = self.cartridge.services().clone();
            let mut services = services.borrow_mut();
            self.platform.pump(&mut services.input)
        };
        if requests.close_requested {
            return Ok(false);
        }
        if let Some((width, height)) = requests.resized {
            let services = self.cartridge.services().clone();
            let mut services = services.borrow_mut();
            services.display.display_size = (width, height);
            if let Some(renderer) = services.renderer.as_mut() {
                // Resize touches swapchain and viewport only; simulation
                // timing and the console framebuffer are unaffected.
                renderer.resize(width, height);
            }
        }

        // 2. Apply deferred display-mode requests from the bindings.
        self.apply_display_requests();

        // 3. CPU half: clock, input freeze, ticks, draw, canvas raster.
        let stats = self.cartridge.advance();

        // 4. GPU half: 3D pass, composite, present.
        self.render_frame()?;

        // 5. Deferred dev requests.
        self.handle_capture();
        if self.take_reload_request() {
            self.reload()?;
        }

        if stats.frame % 600 == 0 && stats.frame > 0 {
            debug!(
                "frame {}: {} ticks, update {:.2} ms, draw {:.2} ms, {} canvas cmds",
                stats.frame, stats.ticks, stats.update_ms, stats.draw_ms, stats.canvas_commands
            );
        }
        Ok(true)
    }

    fn apply_display_requests(&mut self) {
        let services = self.cartridge.services().clone();
        let mut resize_canvas = None;
        {
            let mut services = services.borrow_mut();
            let services = &mut *services;
            if let Some(mode) = services.display.pending_scaling.take() {
                services.display.scaling = mode;
                if let Some(renderer) = services.renderer.as_mut() {
                    renderer.set_scaling_mode(mode);
                }
            }
            if let Some((aspect, preset)) = services.display.pending_console.take() {
                let (width, height) = preset.console_size(aspect);
                services.display.aspect = aspect;
                services.display.preset = preset;
                services.display.console_size = (width, height);
                if let Some(renderer) = services.renderer.as_mut() {
                    renderer.set_console_size(width, height);
                }
                resize_canvas = Some((width, height));
            }
        }
        if let Some((width, height)) = resize_canvas {
            self.cartridge.resize_canvas(width, height);
        }
    }

    fn render_frame(&mut self) -> Result<()> {
        let services = self.cartridge.services().clone();
        let mut services = services.borrow_mut();
        let Services {
            renderer,
            resources,
            cartridge_id,
            active_scene,
            ..
        } = &mut *services;
        let Some(renderer) = renderer.as_mut() else {
            return Ok(());
        };

        // Rebuild GPU materials invalidated by setters this frame.
        {
            let CartridgeResources {
                textures,
                materials,
                ..
            } = resources;
            for (_, entry) in materials.iter_mut() {
                if entry.gpu.is_none() {
                    entry.gpu = Some(renderer.mesh_pass.build_material(
                        &renderer.context.device,
                        entry.data.clone(),
                        |raw| textures.get(Handle::from_raw(raw), cartridge_id).ok(),
                    ));
                }
            }
        }

        // Collect the 3D pass if the active scene requested a render.
        let console_aspect = renderer.console_aspect();
        let scene_pass = build_scene_pass(resources, *active_scene, cartridge_id, console_aspect);

        // The canvas only re-composites when the cartridge drew this
        // frame; a faulted cartridge keeps its last presented content.
        let canvas_pixels = if self.cartridge.state().is_live() {
            self.cartridge.canvas().map(|surface| surface.data())
        } else {
            None
        };

        renderer
            .render_frame(FrameInputs {
                scene: scene_pass,
                canvas_pixels,
            })
            .map_err(Error::Render)
    }

    fn handle_capture(&mut self) {
        let services = self.cartridge.services().clone();
        let mut services = services.borrow_mut();
        let Some(path) = services.pending_capture.take() else {
            return;
        };
        let services = &mut *services;
        let Some(renderer) = services.renderer.as_ref() else {
            return;
        };
        let result = renderer.capture_console().and_then(|pixels| {
            let (width, height) = renderer.console_size();
            encode_png(&pixels, width, height)
                .map_err(|err| arc_render::Error::Device(err))
        });
        match result {
            Ok(png) => match services.vfs.write_bytes(&path, &png) {
                Ok(()) => info!("captured frame to {}", path),
                Err(err) => warn!("captureFrame write failed: {}", err),
            },
            Err(err) => warn!("captureFrame failed: {}", err),
        }
    }

    fn take_reload_request(&self) -> bool {
        let services = self.cartridge.services().clone();
        let taken = std::mem::take(&mut services.borrow_mut().reload_requested);
        taken
    }

    /// Reload = stop + load. No state persists; every owned handle dies
    /// before the new instance reaches `Running`.
    pub fn reload(&mut self) -> Result<()> {
        info!("reloading cartridge");
        let handle = self.cartridge.stop();
        debug_assert_eq!(self.cartridge.outstanding_handles(), 0);
        self.cartridge = LoadedCartridge::load(
            open_cart(&self.cart_path)?,
            &self.user_data_root,
            self.tick_hz,
            self.dev_mode,
            handle,
        )?;
        Ok(())
    }

    pub fn cartridge(&self) -> &LoadedCartridge {
        &self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut LoadedCartridge {
        &mut self.cartridge
    }
}

/// Opens a cartridge path: a directory (dev layout) or a `.arc` archive.
pub fn open_cart(path: &Path) -> Result<CartMount> {
    if path.is_dir() {
        Ok(CartMount::Dir(DiskMount::open(path)?))
    } else {
        let bytes = std::fs::read(path).map_err(|err| {
            Error::Platform(format!("cannot read cartridge {}: {}", path.display(), err))
        })?;
        Ok(CartMount::Archive(ArchiveMount::from_bytes(bytes)?))
    }
}

/// Builds the 3D pass inputs from the active scene, resolving handles to
/// GPU resources. Opaque draws keep stable entity order; blended draws
/// sort back-to-front by view-space depth.
fn build_scene_pass<'a>(
    resources: &'a mut CartridgeResources,
    active: i64,
    owner: &CartridgeId,
    console_aspect: f32,
) -> Option<ScenePass<'a>> {
    if active == 0 {
        return None;
    }
    let requested = resources
        .scenes
        .get_mut(Handle::<Scene>::from_raw(active), owner)
        .ok()?
        .take_render_request();
    if !requested {
        return None;
    }

    let resources = &*resources;
    let scene = resources
        .scenes
        .get(Handle::<Scene>::from_raw(active), owner)
        .ok()?;

    // Camera: render with no active camera fails safely.
    let camera_entity = match scene.active_camera() {
        Some(entity) => entity,
        None => {
            warn!("gfx3d.render: scene has no active camera");
            return None;
        }
    };
    let camera = scene.get(camera_entity).ok()?.camera?;
    let camera_world = scene.world_matrix(camera_entity).ok()?;
    let view = camera.view_matrix(camera_world);
    let proj = camera.projection.matrix(console_aspect);
    let eye = match camera.view {
        CameraView::Explicit { eye, .. } => eye,
        CameraView::FromEntity => camera_world.transform_point3(Vec3::ZERO),
    };

    // Lights in stable entity order, truncated to the shader's array.
    let mut lights = Vec::new();
    for entity in scene.iter_entities() {
        let Ok(record) = scene.get(entity) else { continue };
        let Some(light) = record.light else { continue };
        let Ok(world) = scene.world_matrix(entity) else { continue };
        let position = world.transform_point3(Vec3::ZERO);
        let direction = (world * Vec4::from((0.0, 0.0, -1.0, 0.0))).xyz();
        let (kind, range, inner, outer) = match light.kind {
            LightKind::Directional => (0.0, 0.0, 0.0, 0.0),
            LightKind::Point { range } => (1.0, range, 0.0, 0.0),
            LightKind::Spot {
                range,
                inner_angle,
                outer_angle,
            } => (2.0, range, inner_angle.cos(), outer_angle.cos()),
        };
        let color = light.color * light.intensity;
        lights.push(GpuLight {
            position: [position.x, position.y, position.z, kind],
            direction: [direction.x, direction.y, direction.z, range],
            color: [color.x, color.y, color.z, inner],
            params: [outer, 0.0, 0.0, 0.0],
        });
        if lights.len() == arc_render::MAX_LIGHTS {
            break;
        }
    }

    // Draw lists.
    struct PendingDraw {
        model: Mat4,
        mesh: i64,
        material: i64,
        depth: f32,
        blended: bool,
    }
    let mut pending = Vec::new();
    for entity in scene.iter_entities() {
        let Ok(record) = scene.get(entity) else { continue };
        let Some(mesh_renderer) = record.mesh_renderer else { continue };
        if !mesh_renderer.visible {
            continue;
        }
        let Ok(model) = scene.world_matrix(entity) else { continue };
        let blended = resources
            .materials
            .get(Handle::from_raw(mesh_renderer.material), owner)
            .map(|entry| entry.data.is_blended())
            .unwrap_or(false);
        let view_pos = view.transform_point3(model.transform_point3(Vec3::ZERO));
        pending.push(PendingDraw {
            model,
            mesh: mesh_renderer.mesh,
            material: mesh_renderer.material,
            depth: -view_pos.z,
            blended,
        });
    }
    // Back-to-front for the blended list; stable sort keeps entity order
    // deterministic on ties.
    let mut blended_draws: Vec<&PendingDraw> =
        pending.iter().filter(|draw| draw.blended).collect();
    blended_draws.sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(std::cmp::Ordering::Equal));

    let uniforms = SceneUniforms {
        view,
        proj,
        eye,
        ambient: scene.ambient,
        tonemap: scene.tonemap_enabled,
        lights,
    };

    let meshes = &resources.meshes;
    let materials = &resources.materials;
    let resolve = |draw: &PendingDraw| -> Option<DrawItem<'a>> {
        let mesh = meshes.get(Handle::from_raw(draw.mesh), owner).ok()?;
        let material = materials.get(Handle::from_raw(draw.material), owner).ok()?;
        Some(DrawItem {
            model: draw.model,
            mesh,
            material: material.gpu.as_ref()?,
        })
    };

    let opaque: Vec<DrawItem<'a>> = pending
        .iter()
        .filter(|draw| !draw.blended)
        .filter_map(resolve)
        .collect();
    let blended: Vec<DrawItem<'a>> = blended_draws.into_iter().filter_map(resolve).collect();

    Some(ScenePass {
        uniforms,
        opaque,
        blended,
    })
}


fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(|err| err.to_string())?;
        writer
            .write_image_data(rgba)
            .map_err(|err| err.to_string())?;
    }
    Ok(out)
}
