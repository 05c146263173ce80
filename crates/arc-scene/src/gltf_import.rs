//! Deterministic glTF import.
//!
//! Result order is fixed: textures first (by glTF index), then materials,
//! then meshes (one engine mesh per primitive, primitives in order), then
//! a depth-first traversal of the default scene's node hierarchy creating
//! entities under a fresh root. External references go through the
//! caller-supplied reader, which resolves them relative to the `.gltf`
//! inside its namespace; traversal outside the namespace is impossible by
//! construction of the VFS path rules.

use glam::{Quat, Vec3, Vec4};

use crate::entity::EntityId;
use crate::material::{AlphaMode, Material, MaterialTextures};
use crate::mesh::Mesh;
use crate::scene::Scene;
use crate::texture::TextureData;
use crate::{Error, Result};

/// A material as imported: factors resolved, texture slots still glTF
/// texture indices (the runtime maps them to registry handles).
#[derive(Debug, Clone)]
pub struct ImportedMaterial {
    pub material: Material,
    pub base_color_texture: Option<usize>,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
}

/// One entity created by the import, in DFS order. `mesh` pairs an index
/// into [`GltfImport::meshes`] with an index into [`GltfImport::materials`].
#[derive(Debug, Clone)]
pub struct ImportedNode {
    pub entity: EntityId,
    pub name: Option<String>,
    pub mesh: Option<(usize, Option<usize>)>,
}

/// Everything `gfx3d.loadGltf` returns to the bindings.
pub struct GltfImport {
    pub root: EntityId,
    pub nodes: Vec<ImportedNode>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<ImportedMaterial>,
    pub textures: Vec<TextureData>,
    pub animations: Vec<String>,
}

/// Imports a `.gltf`/`.glb` byte blob into `scene`.
///
/// `read_external` resolves relative URI references (buffers, images);
/// returning `None` fails the import.
///
/// # Errors
///
/// Malformed documents, unresolvable references and undecodable payloads
/// all fail the whole import; a partial scene is never left behind
/// (entities are created only after every payload decoded).
pub fn import_gltf(
    scene: &mut Scene,
    bytes: &[u8],
    mut read_external: impl FnMut(&str) -> Option<Vec<u8>>,
) -> Result<GltfImport> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|err| Error::Gltf(err.to_string()))?;
    let document = gltf.document;
    let mut blob = gltf.blob;

    // Buffers, in index order.
    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .take()
                .ok_or_else(|| Error::Gltf("missing binary chunk".to_string()))?,
            gltf::buffer::Source::Uri(uri) => read_uri(uri, &mut read_external)?,
        };
        if data.len() < buffer.length() {
            return Err(Error::Gltf(format!(
                "buffer {} is shorter than declared",
                buffer.index()
            )));
        }
        buffers.push(data);
    }

    // Color-space role of every texture, from material usage.
    let mut srgb = vec![false; document.textures().count()];
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        if let Some(info) = pbr.base_color_texture() {
            srgb[info.texture().index()] = true;
        }
        if let Some(info) = material.emissive_texture() {
            srgb[info.texture().index()] = true;
        }
    }

    // Textures, in index order.
    let mut textures = Vec::new();
    for texture in document.textures() {
        let image_bytes = match texture.source().source() {
            gltf::image::Source::View { view, .. } => {
                let parent = &buffers[view.buffer().index()];
                let start = view.offset();
                let end = start + view.length();
                parent
                    .get(start..end)
                    .ok_or_else(|| Error::Gltf("image view out of bounds".to_string()))?
                    .to_vec()
            }
            gltf::image::Source::Uri { uri, .. } => read_uri(uri, &mut read_external)?,
        };
        textures.push(TextureData::decode(
            &image_bytes,
            srgb[texture.index()],
        )?);
    }

    // Materials, in index order.
    let materials: Vec<ImportedMaterial> =
        document.materials().map(convert_material).collect();

    // Meshes: one engine mesh per primitive, primitives in order.
    let mut meshes = Vec::new();
    // Per glTF mesh: the list of (engine mesh index, material index).
    let mut mesh_entries: Vec<Vec<(usize, Option<usize>)>> = Vec::new();
    for mesh in document.meshes() {
        let mut entries = Vec::new();
        for primitive in mesh.primitives() {
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| Error::Gltf("primitive has no positions".to_string()))?
                .collect();
            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            let tangents: Vec<[f32; 4]> = reader
                .read_tangents()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            let uvs = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().collect())
                .unwrap_or_default();
            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let engine_mesh = Mesh {
                positions,
                normals,
                tangents,
                uvs,
                indices,
            }
            .finalize()?;
            entries.push((meshes.len(), primitive.material().index()));
            meshes.push(engine_mesh);
        }
        mesh_entries.push(entries);
    }

    // Entities: DFS of the default scene under a fresh root.
    let root = scene.create_entity();
    let mut nodes = Vec::new();
    if let Some(default_scene) = document.default_scene().or_else(|| document.scenes().next()) {
        for node in default_scene.nodes() {
            import_node(scene, &node, root, &mesh_entries, &mut nodes)?;
        }
    }

    let animations = document
        .animations()
        .map(|animation| animation.name().unwrap_or("").to_string())
        .collect();

    Ok(GltfImport {
        root,
        nodes,
        meshes,
        materials,
        textures,
        animations,
    })
}

fn import_node(
    scene: &mut Scene,
    node: &gltf::Node<'_>,
    parent: EntityId,
    mesh_entries: &[Vec<(usize, Option<usize>)>],
    out: &mut Vec<ImportedNode>,
) -> Result<()> {
    let entity = scene.create_entity();
    scene.set_parent(entity, parent)?;

    let (translation, rotation, scale) = node.transform().decomposed();
    {
        let record = scene.get_mut(entity)?;
        record.transform.position = Vec3::from_array(translation);
        record.transform.rotation = Quat::from_array(rotation).normalize();
        // glTF allows zero scale; clamp to a representable minimum rather
        // than rejecting the whole asset.
        let scale = Vec3::from_array(scale);
        record.transform.scale = Vec3::new(
            nonzero(scale.x),
            nonzero(scale.y),
            nonzero(scale.z),
        );
    }

    let name = node.name().map(str::to_string);
    match node.mesh() {
        Some(mesh) => {
            let entries = &mesh_entries[mesh.index()];
            match entries.as_slice() {
                [] => out.push(ImportedNode {
                    entity,
                    name,
                    mesh: None,
                }),
                [single] => out.push(ImportedNode {
                    entity,
                    name,
                    mesh: Some(*single),
                }),
                many => {
                    // Multi-primitive meshes fan out into child entities,
                    // one per primitive, keeping primitive order.
                    out.push(ImportedNode {
                        entity,
                        name,
                        mesh: None,
                    });
                    for entry in many {
                        let child = scene.create_entity();
                        scene.set_parent(child, entity)?;
                        out.push(ImportedNode {
                            entity: child,
                            name: None,
                            mesh: Some(*entry),
                        });
                    }
                }
            }
        }
        None => out.push(ImportedNode {
            entity,
            name,
            mesh: None,
        }),
    }

    for child in node.children() {
        import_node(scene, &child, entity, mesh_entries, out)?;
    }
    Ok(())
}

fn convert_material(material: gltf::Material<'_>) -> ImportedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let alpha_mode = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask {
            cutoff: material.alpha_cutoff().unwrap_or(0.5),
        },
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    };
    ImportedMaterial {
        material: Material {
            base_color_factor: Vec4::from_array(pbr.base_color_factor()),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            emissive_factor: Vec3::from_array(material.emissive_factor()),
            normal_scale: material.normal_texture().map_or(1.0, |t| t.scale()),
            occlusion_strength: material.occlusion_texture().map_or(1.0, |t| t.strength()),
            alpha_mode,
            double_sided: material.double_sided(),
            textures: MaterialTextures::default(),
        },
        base_color_texture: pbr.base_color_texture().map(|info| info.texture().index()),
        metallic_roughness_texture: pbr
            .metallic_roughness_texture()
            .map(|info| info.texture().index()),
        normal_texture: material.normal_texture().map(|info| info.texture().index()),
        emissive_texture: material.emissive_texture().map(|info| info.texture().index()),
        occlusion_texture: material
            .occlusion_texture()
            .map(|info| info.texture().index()),
    }
}

fn nonzero(value: f32) -> f32 {
    if !value.is_finite() || value == 0.0 {
        1e-6
    } else {
        value
    }
}

fn read_uri(uri: &str, read_external: &mut impl FnMut(&str) -> Option<Vec<u8>>) -> Result<Vec<u8>> {
    if let Some(data) = uri.strip_prefix("data:") {
        let encoded = data
            .split_once(";base64,")
            .map(|(_, tail)| tail)
            .ok_or_else(|| Error::Gltf("unsupported data URI encoding".to_string()))?;
        return base64::decode(encoded).map_err(|err| Error::Gltf(err.to_string()));
    }
    read_external(uri).ok_or_else(|| Error::ExternalRef(uri.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-triangle glTF document around the given buffer URI.
    fn gltf_with_uri(uri: &str, byte_length: usize) -> String {
        format!(
            r#"{{
            "asset": {{"version": "2.0"}},
            "scene": 0,
            "scenes": [{{"nodes": [0]}}],
            "nodes": [{{"mesh": 0, "translation": [2.0, 0.0, 0.0], "name": "tri"}}],
            "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1}}]}}],
            "buffers": [{{"uri": "{uri}", "byteLength": {len}}}],
            "bufferViews": [
                {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
                {{"buffer": 0, "byteOffset": 36, "byteLength": 6}}
            ],
            "accessors": [
                {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
                {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
            ]
        }}"#,
            uri = uri,
            len = byte_length
        )
    }

    /// Minimal single-triangle glTF document with an embedded buffer.
    fn triangle_gltf() -> String {
        // 3 positions (f32x3) followed by 3 u16 indices, little-endian.
        let mut bin: Vec<u8> = Vec::new();
        for v in [
            [0.0_f32, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ] {
            for c in v {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0_u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let uri = format!("data:application/octet-stream;base64,{}", base64::encode(&bin));
        gltf_with_uri(&uri, bin.len())
    }

    #[test]
    fn imports_a_triangle_deterministically() {
        let source = triangle_gltf();
        let mut scene = Scene::new();
        let import = import_gltf(&mut scene, source.as_bytes(), |_| None).unwrap();

        assert_eq!(import.meshes.len(), 1);
        assert_eq!(import.meshes[0].triangle_count(), 1);
        assert_eq!(import.nodes.len(), 1);
        assert_eq!(import.nodes[0].name.as_deref(), Some("tri"));
        assert_eq!(import.nodes[0].mesh, Some((0, None)));
        assert!(import.textures.is_empty());

        // The node entity hangs under the fresh root with its translation.
        let node = import.nodes[0].entity;
        assert_eq!(scene.get(node).unwrap().parent, import.root);
        assert_eq!(
            scene.get(node).unwrap().transform.position,
            Vec3::new(2.0, 0.0, 0.0)
        );
        // Root + node.
        assert_eq!(scene.entity_count(), 2);

        // Normals were generated for the positions-only primitive.
        assert_eq!(import.meshes[0].normals.len(), 3);
    }

    #[test]
    fn missing_external_reference_fails() {
        let source = gltf_with_uri("missing.bin", 42);
        let mut scene = Scene::new();
        let result = import_gltf(&mut scene, source.as_bytes(), |_| None);
        assert!(matches!(result, Err(Error::ExternalRef(_))));
    }

    #[test]
    fn external_references_resolve_through_the_reader() {
        let mut bin: Vec<u8> = Vec::new();
        for v in [[0.0_f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0_u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let source = gltf_with_uri("tri.bin", bin.len());
        let mut scene = Scene::new();
        let import = import_gltf(&mut scene, source.as_bytes(), |uri| {
            (uri == "tri.bin").then(|| bin.clone())
        })
        .unwrap();
        assert_eq!(import.meshes[0].vertex_count(), 3);
    }
}
