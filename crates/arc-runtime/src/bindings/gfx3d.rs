//! `gfx3d` namespace: scenes, entities, components, materials, textures,
//! the glTF importer and the per-frame render request.

use std::sync::Arc;

use glam::{Quat, Vec3, Vec4};
use rhai::{Dynamic, Module};

use arc_registry::Handle;
use arc_scene::{
    import_gltf, AlphaMode, Camera, CameraView, EntityId, Light, LightKind, Material,
    MeshRenderer, Projection, Scene, TextureData,
};

use super::native;
use crate::resources::MaterialEntry;
use crate::services::{as_finite_f32, fail, Services, Shared};

macro_rules! floats {
    ($s:expr, $func:literal, $failure:expr, [$($arg:ident),+]) => {
        [$(
            match as_finite_f32(&$arg) {
                Some(value) => value,
                None => {
                    return Ok(fail(
                        $s.dev_mode,
                        $func,
                        "arguments must be finite numbers",
                        $failure,
                    ))
                }
            }
        ),+]
    };
}

/// Resolves a scene handle or fails the binding.
macro_rules! scene_mut {
    ($s:expr, $func:literal, $failure:expr, $handle:expr) => {{
        let owner = $s.cartridge_id.clone();
        match $s
            .resources
            .scenes
            .get_mut(Handle::<Scene>::from_raw($handle), &owner)
        {
            Ok(scene) => scene,
            Err(err) => return Ok(fail($s.dev_mode, $func, err, $failure)),
        }
    }};
}

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    // --- scenes ---

    native!(module, services, "createScene", |s| {
        let owner = s.cartridge_id.clone();
        match s.resources.scenes.allocate(&owner, Scene::new()) {
            Ok(handle) => handle.as_raw(),
            Err(err) => fail(s.dev_mode, "gfx3d.createScene", err, 0_i64),
        }
    });
    native!(module, services, "freeScene", |s, handle: i64| {
        s.resources.scenes.free(Handle::from_raw(handle));
        if s.active_scene == handle {
            s.active_scene = 0;
        }
    });
    native!(module, services, "setActiveScene", |s, handle: i64| {
        let owner = s.cartridge_id.clone();
        if s.resources.scenes.get(Handle::<Scene>::from_raw(handle), &owner).is_err() {
            return Ok(fail(s.dev_mode, "gfx3d.setActiveScene", "invalid scene handle", false));
        }
        s.active_scene = handle;
        true
    });

    // --- entities & hierarchy ---

    native!(module, services, "createEntity", |s, scene: i64| {
        let scene = scene_mut!(s, "gfx3d.createEntity", 0_i64, scene);
        scene.create_entity().as_raw()
    });
    native!(module, services, "destroyEntity", |s, scene: i64, entity: i64| {
        let scene = scene_mut!(s, "gfx3d.destroyEntity", (), scene);
        scene.destroy_entity(EntityId::from_raw(entity));
    });
    native!(module, services, "setParent", |s, scene: i64, child: i64, parent: i64| {
        let scene = scene_mut!(s, "gfx3d.setParent", false, scene);
        match scene.set_parent(EntityId::from_raw(child), EntityId::from_raw(parent)) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "gfx3d.setParent", err, false),
        }
    });

    // --- transforms ---

    native!(
        module,
        services,
        "setPosition",
        |s, scene: i64, entity: i64, x: Dynamic, y: Dynamic, z: Dynamic| {
            let [x, y, z] = floats!(s, "gfx3d.setPosition", false, [x, y, z]);
            let scene = scene_mut!(s, "gfx3d.setPosition", false, scene);
            match scene.set_position(EntityId::from_raw(entity), Vec3::new(x, y, z)) {
                Ok(()) => true,
                Err(err) => fail(s.dev_mode, "gfx3d.setPosition", err, false),
            }
        }
    );
    native!(
        module,
        services,
        "setRotation",
        |s, scene: i64, entity: i64, x: Dynamic, y: Dynamic, z: Dynamic, w: Dynamic| {
            let [x, y, z, w] = floats!(s, "gfx3d.setRotation", false, [x, y, z, w]);
            let scene = scene_mut!(s, "gfx3d.setRotation", false, scene);
            match scene.set_rotation(EntityId::from_raw(entity), Quat::from_xyzw(x, y, z, w)) {
                Ok(()) => true,
                Err(err) => fail(s.dev_mode, "gfx3d.setRotation", err, false),
            }
        }
    );
    native!(
        module,
        services,
        "setScale",
        |s, scene: i64, entity: i64, x: Dynamic, y: Dynamic, z: Dynamic| {
            let [x, y, z] = floats!(s, "gfx3d.setScale", false, [x, y, z]);
            let scene = scene_mut!(s, "gfx3d.setScale", false, scene);
            match scene.set_scale(EntityId::from_raw(entity), Vec3::new(x, y, z)) {
                Ok(()) => true,
                Err(err) => fail(s.dev_mode, "gfx3d.setScale", err, false),
            }
        }
    );

    // --- mesh renderers ---

    native!(
        module,
        services,
        "setMeshRenderer",
        |s, scene: i64, entity: i64, mesh: i64, material: i64| {
            // Validate the referenced handles before the scene records them.
            let owner = s.cartridge_id.clone();
            if s.resources.meshes.get(Handle::from_raw(mesh), &owner).is_err() {
                return Ok(fail(s.dev_mode, "gfx3d.setMeshRenderer", "invalid mesh handle", false));
            }
            if s
                .resources
                .materials
                .get(Handle::from_raw(material), &owner)
                .is_err()
            {
                return Ok(fail(
                    s.dev_mode,
                    "gfx3d.setMeshRenderer",
                    "invalid material handle",
                    false,
                ));
            }
            let scene = scene_mut!(s, "gfx3d.setMeshRenderer", false, scene);
            let renderer = MeshRenderer {
                mesh,
                material,
                visible: true,
            };
            match scene.set_mesh_renderer(EntityId::from_raw(entity), Some(renderer)) {
                Ok(()) => true,
                Err(err) => fail(s.dev_mode, "gfx3d.setMeshRenderer", err, false),
            }
        }
    );
    native!(module, services, "clearMeshRenderer", |s, scene: i64, entity: i64| {
        let scene = scene_mut!(s, "gfx3d.clearMeshRenderer", false, scene);
        match scene.set_mesh_renderer(EntityId::from_raw(entity), None) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "gfx3d.clearMeshRenderer", err, false),
        }
    });

    // --- lights ---

    native!(
        module,
        services,
        "setDirectionalLight",
        |s, scene: i64, entity: i64, r: Dynamic, g: Dynamic, b: Dynamic, intensity: Dynamic| {
            let [r, g, b, intensity] =
                floats!(s, "gfx3d.setDirectionalLight", false, [r, g, b, intensity]);
            set_light(&mut s, scene, entity, Light {
                kind: LightKind::Directional,
                color: Vec3::new(r, g, b),
                intensity,
            })
        }
    );
    native!(
        module,
        services,
        "setPointLight",
        |s,
         scene: i64,
         entity: i64,
         r: Dynamic,
         g: Dynamic,
         b: Dynamic,
         intensity: Dynamic,
         range: Dynamic| {
            let [r, g, b, intensity, range] =
                floats!(s, "gfx3d.setPointLight", false, [r, g, b, intensity, range]);
            set_light(&mut s, scene, entity, Light {
                kind: LightKind::Point { range },
                color: Vec3::new(r, g, b),
                intensity,
            })
        }
    );
    native!(
        module,
        services,
        "setSpotLight",
        |s,
         scene: i64,
         entity: i64,
         r: Dynamic,
         g: Dynamic,
         b: Dynamic,
         intensity: Dynamic,
         range: Dynamic,
         inner: Dynamic,
         outer: Dynamic| {
            let [r, g, b, intensity, range, inner, outer] = floats!(
                s,
                "gfx3d.setSpotLight",
                false,
                [r, g, b, intensity, range, inner, outer]
            );
            set_light(&mut s, scene, entity, Light {
                kind: LightKind::Spot {
                    range,
                    inner_angle: inner,
                    outer_angle: outer,
                },
                color: Vec3::new(r, g, b),
                intensity,
            })
        }
    );
    native!(module, services, "clearLight", |s, scene: i64, entity: i64| {
        let scene = scene_mut!(s, "gfx3d.clearLight", false, scene);
        match scene.set_light(EntityId::from_raw(entity), None) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "gfx3d.clearLight", err, false),
        }
    });

    // --- cameras ---

    native!(
        module,
        services,
        "setPerspectiveCamera",
        |s, scene: i64, entity: i64, fov_y: Dynamic, near: Dynamic, far: Dynamic| {
            let [fov_y, near, far] =
                floats!(s, "gfx3d.setPerspectiveCamera", false, [fov_y, near, far]);
            set_camera(&mut s, scene, entity, Projection::Perspective { fov_y, near, far })
        }
    );
    native!(
        module,
        services,
        "setOrthographicCamera",
        |s, scene: i64, entity: i64, height: Dynamic, near: Dynamic, far: Dynamic| {
            let [height, near, far] =
                floats!(s, "gfx3d.setOrthographicCamera", false, [height, near, far]);
            set_camera(&mut s, scene, entity, Projection::Orthographic { height, near, far })
        }
    );
    native!(
        module,
        services,
        "setCameraLookAt",
        |s,
         scene: i64,
         entity: i64,
         ex: Dynamic,
         ey: Dynamic,
         ez: Dynamic,
         ax: Dynamic,
         ay: Dynamic,
         az: Dynamic| {
            let [ex, ey, ez, ax, ay, az] =
                floats!(s, "gfx3d.setCameraLookAt", false, [ex, ey, ez, ax, ay, az]);
            let scene = scene_mut!(s, "gfx3d.setCameraLookAt", false, scene);
            let id = EntityId::from_raw(entity);
            let Ok(record) = scene.get(id) else {
                return Ok(fail(s.dev_mode, "gfx3d.setCameraLookAt", "unknown entity", false));
            };
            let Some(mut camera) = record.camera else {
                return Ok(fail(
                    s.dev_mode,
                    "gfx3d.setCameraLookAt",
                    "entity has no camera component",
                    false,
                ));
            };
            camera.view = CameraView::Explicit {
                eye: Vec3::new(ex, ey, ez),
                at: Vec3::new(ax, ay, az),
                up: Vec3::Y,
            };
            match scene.set_camera(id, Some(camera)) {
                Ok(()) => true,
                Err(err) => fail(s.dev_mode, "gfx3d.setCameraLookAt", err, false),
            }
        }
    );
    native!(module, services, "setActiveCamera", |s, scene: i64, entity: i64| {
        let scene = scene_mut!(s, "gfx3d.setActiveCamera", false, scene);
        match scene.set_active_camera(EntityId::from_raw(entity)) {
            Ok(()) => true,
            Err(err) => fail(s.dev_mode, "gfx3d.setActiveCamera", err, false),
        }
    });

    // --- environment ---

    native!(
        module,
        services,
        "setAmbient",
        |s, scene: i64, r: Dynamic, g: Dynamic, b: Dynamic| {
            let [r, g, b] = floats!(s, "gfx3d.setAmbient", false, [r, g, b]);
            if r < 0.0 || g < 0.0 || b < 0.0 {
                return Ok(fail(s.dev_mode, "gfx3d.setAmbient", "color must be non-negative", false));
            }
            let scene = scene_mut!(s, "gfx3d.setAmbient", false, scene);
            scene.ambient = Vec3::new(r, g, b);
            true
        }
    );

    native!(module, services, "setTonemapper", |s, scene: i64, name: &str| {
        let enabled = match name {
            "reinhard" => true,
            "off" => false,
            other => {
                return Ok(fail(
                    s.dev_mode,
                    "gfx3d.setTonemapper",
                    format!("unknown tonemapper {:?}", other),
                    false,
                ))
            }
        };
        let scene = scene_mut!(s, "gfx3d.setTonemapper", false, scene);
        scene.tonemap_enabled = enabled;
        true
    });

    // --- textures & materials ---

    native!(module, services, "loadTexture", |s, path: &str, srgb: bool| {
        let bytes = match s.vfs.read_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => return Ok(fail(s.dev_mode, "gfx3d.loadTexture", err, 0_i64)),
        };
        let data = match TextureData::decode(&bytes, srgb) {
            Ok(data) => data,
            Err(err) => return Ok(fail(s.dev_mode, "gfx3d.loadTexture", err, 0_i64)),
        };
        allocate_texture(&mut s, "gfx3d.loadTexture", &data)
    });
    native!(module, services, "freeTexture", |s, handle: i64| {
        if let Some(texture) = s.resources.textures.free(Handle::from_raw(handle)) {
            s.resources.texture_memory.release(texture.byte_size);
        }
    });

    native!(module, services, "createMaterial", |s| {
        let owner = s.cartridge_id.clone();
        match s
            .resources
            .materials
            .allocate(&owner, MaterialEntry::new(Material::default()))
        {
            Ok(handle) => handle.as_raw(),
            Err(err) => fail(s.dev_mode, "gfx3d.createMaterial", err, 0_i64),
        }
    });
    native!(module, services, "freeMaterial", |s, handle: i64| {
        s.resources.materials.free(Handle::from_raw(handle));
    });
    native!(
        module,
        services,
        "setMaterialBaseColor",
        |s, material: i64, r: Dynamic, g: Dynamic, b: Dynamic, a: Dynamic| {
            let [r, g, b, a] = floats!(s, "gfx3d.setMaterialBaseColor", false, [r, g, b, a]);
            with_material(&mut s, "gfx3d.setMaterialBaseColor", material, |entry| {
                entry.data.base_color_factor = Vec4::new(r, g, b, a);
            })
        }
    );
    native!(
        module,
        services,
        "setMaterialMetallicRoughness",
        |s, material: i64, metallic: Dynamic, roughness: Dynamic| {
            let [metallic, roughness] = floats!(
                s,
                "gfx3d.setMaterialMetallicRoughness",
                false,
                [metallic, roughness]
            );
            with_material(&mut s, "gfx3d.setMaterialMetallicRoughness", material, |entry| {
                entry.data.metallic_factor = metallic.clamp(0.0, 1.0);
                entry.data.roughness_factor = roughness.clamp(0.0, 1.0);
            })
        }
    );
    native!(
        module,
        services,
        "setMaterialEmissive",
        |s, material: i64, r: Dynamic, g: Dynamic, b: Dynamic| {
            let [r, g, b] = floats!(s, "gfx3d.setMaterialEmissive", false, [r, g, b]);
            with_material(&mut s, "gfx3d.setMaterialEmissive", material, |entry| {
                entry.data.emissive_factor = Vec3::new(r, g, b);
            })
        }
    );
    native!(
        module,
        services,
        "setMaterialAlphaMode",
        |s, material: i64, mode: &str, cutoff: Dynamic| {
            let [cutoff] = floats!(s, "gfx3d.setMaterialAlphaMode", false, [cutoff]);
            let alpha_mode = match mode {
                "opaque" => AlphaMode::Opaque,
                "mask" => AlphaMode::Mask {
                    cutoff: cutoff.clamp(0.0, 1.0),
                },
                "blend" => AlphaMode::Blend,
                other => {
                    return Ok(fail(
                        s.dev_mode,
                        "gfx3d.setMaterialAlphaMode",
                        format!("unknown alpha mode {:?}", other),
                        false,
                    ))
                }
            };
            with_material(&mut s, "gfx3d.setMaterialAlphaMode", material, |entry| {
                entry.data.alpha_mode = alpha_mode;
            })
        }
    );
    native!(
        module,
        services,
        "setMaterialDoubleSided",
        |s, material: i64, double_sided: bool| {
            with_material(&mut s, "gfx3d.setMaterialDoubleSided", material, |entry| {
                entry.data.double_sided = double_sided;
            })
        }
    );
    native!(
        module,
        services,
        "setMaterialTexture",
        |s, material: i64, slot: &str, texture: i64| {
            // Texture 0 clears the slot; anything else must resolve.
            if texture != 0 {
                let owner = s.cartridge_id.clone();
                if s.resources.textures.get(Handle::from_raw(texture), &owner).is_err() {
                    return Ok(fail(
                        s.dev_mode,
                        "gfx3d.setMaterialTexture",
                        "invalid texture handle",
                        false,
                    ));
                }
            }
            let assign: fn(&mut Material, i64) = match slot {
                "baseColor" => |m: &mut Material, t| m.textures.base_color = t,
                "metallicRoughness" => |m: &mut Material, t| m.textures.metallic_roughness = t,
                "normal" => |m: &mut Material, t| m.textures.normal = t,
                "emissive" => |m: &mut Material, t| m.textures.emissive = t,
                "occlusion" => |m: &mut Material, t| m.textures.occlusion = t,
                other => {
                    return Ok(fail(
                        s.dev_mode,
                        "gfx3d.setMaterialTexture",
                        format!("unknown texture slot {:?}", other),
                        false,
                    ))
                }
            };
            with_material(&mut s, "gfx3d.setMaterialTexture", material, |entry| {
                assign(&mut entry.data, texture);
            })
        }
    );

    // --- glTF ---

    native!(module, services, "loadGltf", |s, scene: i64, path: &str| {
        match load_gltf(&mut s, scene, path) {
            Ok(result) => result,
            Err(message) => fail(s.dev_mode, "gfx3d.loadGltf", message, Dynamic::UNIT),
        }
    });

    // --- render request ---

    native!(module, services, "render", |s| {
        if s.active_scene == 0 {
            return Ok(fail(s.dev_mode, "gfx3d.render", "no active scene", false));
        }
        let active = s.active_scene;
        let dev_mode = s.dev_mode;
        s.render_requests_this_frame += 1;
        let repeat = s.render_requests_this_frame > 1;
        let scene = scene_mut!(s, "gfx3d.render", false, active);
        scene.request_render();
        if repeat && dev_mode {
            arc_tracing::warn!("gfx3d.render: called more than once this frame; only the last result is visible");
        }
        true
    });

    module
}

fn set_light(s: &mut Services, scene: i64, entity: i64, light: Light) -> bool {
    let dev_mode = s.dev_mode;
    let owner = s.cartridge_id.clone();
    let scene = match s.resources.scenes.get_mut(Handle::<Scene>::from_raw(scene), &owner) {
        Ok(scene) => scene,
        Err(err) => return fail(dev_mode, "gfx3d.setLight", err, false),
    };
    match scene.set_light(EntityId::from_raw(entity), Some(light)) {
        Ok(()) => true,
        Err(err) => fail(dev_mode, "gfx3d.setLight", err, false),
    }
}

fn set_camera(s: &mut Services, scene: i64, entity: i64, projection: Projection) -> bool {
    let dev_mode = s.dev_mode;
    let owner = s.cartridge_id.clone();
    let scene = match s.resources.scenes.get_mut(Handle::<Scene>::from_raw(scene), &owner) {
        Ok(scene) => scene,
        Err(err) => return fail(dev_mode, "gfx3d.setCamera", err, false),
    };
    let camera = Camera {
        projection,
        view: CameraView::FromEntity,
    };
    match scene.set_camera(EntityId::from_raw(entity), Some(camera)) {
        Ok(()) => true,
        Err(err) => fail(dev_mode, "gfx3d.setCamera", err, false),
    }
}

fn with_material(
    s: &mut Services,
    func: &'static str,
    handle: i64,
    mutate: impl FnOnce(&mut MaterialEntry),
) -> bool {
    let dev_mode = s.dev_mode;
    let owner = s.cartridge_id.clone();
    match s.resources.materials.get_mut(Handle::from_raw(handle), &owner) {
        Ok(entry) => {
            mutate(entry);
            entry.invalidate();
            true
        }
        Err(err) => fail(dev_mode, func, err, false),
    }
}

fn allocate_texture(s: &mut Services, func: &'static str, data: &TextureData) -> i64 {
    let dev_mode = s.dev_mode;
    let Some(renderer) = s.renderer.as_ref() else {
        return fail(dev_mode, func, "graphics device unavailable", 0_i64);
    };
    let gpu = renderer
        .mesh_pass
        .upload_texture(&renderer.context.device, &renderer.context.queue, data);
    if let Err(err) = s.resources.texture_memory.charge(gpu.byte_size) {
        return fail(dev_mode, func, err, 0_i64);
    }
    let owner = s.cartridge_id.clone();
    match s.resources.textures.allocate(&owner, gpu) {
        Ok(handle) => handle.as_raw(),
        Err(err) => {
            s.resources.texture_memory.release(data.byte_size());
            fail(dev_mode, func, err, 0_i64)
        }
    }
}

/// Reads, imports and uploads a glTF asset; returns the script-facing
/// result map.
fn load_gltf(s: &mut Services, scene_handle: i64, path: &str) -> Result<Dynamic, String> {
    let owner = s.cartridge_id.clone();
    let bytes = s.vfs.read_bytes(path).map_err(|err| err.to_string())?;

    let base_dir = arc_vfs::VfsPath::parse(path)
        .map_err(|err| err.to_string())?
        .parent();

    // Run the import against the target scene.
    let import = {
        let scene = s
            .resources
            .scenes
            .get_mut(Handle::<Scene>::from_raw(scene_handle), &owner)
            .map_err(|err| err.to_string())?;
        // External references resolve relative to the glTF inside cart:/;
        // the path rules already forbid leaving the namespace.
        let vfs = &s.vfs;
        import_gltf(scene, &bytes, |uri| {
            let target = base_dir.join(uri).ok()?;
            vfs.read_bytes(&target.to_string()).ok()
        })
        .map_err(|err| err.to_string())?
    };

    let Some(renderer) = s.renderer.as_ref() else {
        return Err("graphics device unavailable".to_string());
    };
    let device = &renderer.context.device;
    let queue = &renderer.context.queue;

    // Textures first (by index), then materials, then meshes, mirroring
    // the import order.
    let mut texture_handles = Vec::with_capacity(import.textures.len());
    for data in &import.textures {
        let gpu = renderer.mesh_pass.upload_texture(device, queue, data);
        s.resources
            .texture_memory
            .charge(gpu.byte_size)
            .map_err(|err| err.to_string())?;
        let handle = s
            .resources
            .textures
            .allocate(&owner, gpu)
            .map_err(|err| err.to_string())?;
        texture_handles.push(handle.as_raw());
    }

    let resolve = |index: Option<usize>| -> i64 {
        index
            .and_then(|index| texture_handles.get(index).copied())
            .unwrap_or(0)
    };
    let mut material_handles = Vec::with_capacity(import.materials.len());
    for imported in &import.materials {
        let mut material = imported.material.clone();
        material.textures.base_color = resolve(imported.base_color_texture);
        material.textures.metallic_roughness = resolve(imported.metallic_roughness_texture);
        material.textures.normal = resolve(imported.normal_texture);
        material.textures.emissive = resolve(imported.emissive_texture);
        material.textures.occlusion = resolve(imported.occlusion_texture);
        let handle = s
            .resources
            .materials
            .allocate(&owner, MaterialEntry::new(material))
            .map_err(|err| err.to_string())?;
        material_handles.push(handle.as_raw());
    }
    // A default material for primitives without one.
    let default_material = s
        .resources
        .materials
        .allocate(&owner, MaterialEntry::new(Material::default()))
        .map_err(|err| err.to_string())?
        .as_raw();

    let mut mesh_handles = Vec::with_capacity(import.meshes.len());
    for mesh in &import.meshes {
        let gpu = renderer.mesh_pass.upload_mesh(device, mesh);
        let handle = s
            .resources
            .meshes
            .allocate(&owner, gpu)
            .map_err(|err| err.to_string())?;
        mesh_handles.push(handle.as_raw());
    }

    // Wire the imported nodes' renderers now that handles exist.
    {
        let scene = s
            .resources
            .scenes
            .get_mut(Handle::<Scene>::from_raw(scene_handle), &owner)
            .map_err(|err| err.to_string())?;
        for node in &import.nodes {
            if let Some((mesh_index, material_index)) = node.mesh {
                let renderer = MeshRenderer {
                    mesh: mesh_handles[mesh_index],
                    material: material_index
                        .and_then(|index| material_handles.get(index).copied())
                        .unwrap_or(default_material),
                    visible: true,
                };
                scene
                    .set_mesh_renderer(node.entity, Some(renderer))
                    .map_err(|err| err.to_string())?;
            }
        }
    }

    let mut map = rhai::Map::new();
    map.insert("root".into(), Dynamic::from(import.root.as_raw()));
    map.insert(
        "meshes".into(),
        Dynamic::from(mesh_handles.into_iter().map(Dynamic::from).collect::<rhai::Array>()),
    );
    map.insert(
        "materials".into(),
        Dynamic::from(
            material_handles
                .into_iter()
                .map(Dynamic::from)
                .collect::<rhai::Array>(),
        ),
    );
    map.insert(
        "textures".into(),
        Dynamic::from(
            texture_handles
                .into_iter()
                .map(Dynamic::from)
                .collect::<rhai::Array>(),
        ),
    );
    map.insert(
        "animations".into(),
        Dynamic::from(
            import
                .animations
                .into_iter()
                .map(Dynamic::from)
                .collect::<rhai::Array>(),
        ),
    );
    Ok(Dynamic::from_map(map))
}
