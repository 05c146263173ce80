//! Cartridge-scoped resource pools.
//!
//! One instance per cartridge; every handle a script sees resolves here.
//! Stop and reload call [`CartridgeResources::destroy_all`], which is the
//! invariant the whole lifetime model hangs on: no handle survives into
//! the next `Running` state.

use std::sync::Arc;

use arc_canvas::{CanvasImage, FontResource, GradientPaint, Surface};
use arc_cartridge::EffectivePolicy;
use arc_core::CartridgeId;
use arc_registry::{MemoryBudget, Pool};
use arc_render::{GpuMaterial, GpuMesh, GpuTexture};
use arc_scene::{Material, Scene};

/// A material's CPU description plus its lazily (re)built GPU form.
pub struct MaterialEntry {
    pub data: Material,
    pub gpu: Option<GpuMaterial>,
}

impl MaterialEntry {
    pub fn new(data: Material) -> Self {
        Self { data, gpu: None }
    }

    pub fn invalidate(&mut self) {
        self.gpu = None;
    }
}

pub struct CartridgeResources {
    pub surfaces: Pool<Surface>,
    pub images: Pool<Arc<CanvasImage>>,
    pub fonts: Pool<Arc<FontResource>>,
    pub paints: Pool<Arc<GradientPaint>>,
    pub scenes: Pool<Scene>,
    pub meshes: Pool<GpuMesh>,
    pub materials: Pool<MaterialEntry>,
    pub textures: Pool<GpuTexture>,
    pub sounds: Pool<Arc<arc_audio::SoundData>>,
    /// Raw module bytes; decoded on play through the module seam.
    pub modules: Pool<Vec<u8>>,
    pub texture_memory: MemoryBudget,
    pub surface_pixels: MemoryBudget,
}

impl CartridgeResources {
    pub fn new(policy: &EffectivePolicy) -> Self {
        Self {
            surfaces: Pool::new("surface", policy.max_surfaces),
            images: Pool::new("image", policy.max_images),
            fonts: Pool::new("font", policy.max_fonts),
            paints: Pool::new("paint", policy.max_paints),
            scenes: Pool::new("scene", policy.max_scenes),
            meshes: Pool::new("mesh", policy.max_meshes),
            materials: Pool::new("material", policy.max_materials),
            textures: Pool::new("texture", policy.max_textures),
            sounds: Pool::new("sound", policy.max_sounds),
            modules: Pool::new("module", policy.max_modules),
            texture_memory: MemoryBudget::new("texture-memory", policy.texture_memory_bytes),
            surface_pixels: MemoryBudget::new("surface-pixels", policy.surface_pixel_budget),
        }
    }

    /// Total live handles owned by the cartridge, across every pool.
    pub fn outstanding(&self) -> u32 {
        self.surfaces.live_count()
            + self.images.live_count()
            + self.fonts.live_count()
            + self.paints.live_count()
            + self.scenes.live_count()
            + self.meshes.live_count()
            + self.materials.live_count()
            + self.textures.live_count()
            + self.sounds.live_count()
            + self.modules.live_count()
    }

    /// Destroys every resource owned by `owner`. GPU and audio payloads
    /// drop here on the main thread; the audio mixer was quiesced first
    /// via `StopAll`.
    pub fn destroy_all(&mut self, owner: &CartridgeId) {
        drop(self.surfaces.clear_owned_by(owner));
        drop(self.images.clear_owned_by(owner));
        drop(self.fonts.clear_owned_by(owner));
        drop(self.paints.clear_owned_by(owner));
        drop(self.scenes.clear_owned_by(owner));
        drop(self.meshes.clear_owned_by(owner));
        drop(self.materials.clear_owned_by(owner));
        drop(self.textures.clear_owned_by(owner));
        drop(self.sounds.clear_owned_by(owner));
        drop(self.modules.clear_owned_by(owner));
        self.texture_memory.reset();
        self.surface_pixels.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_all_zeroes_outstanding_handles() {
        let policy = EffectivePolicy::default();
        let owner = CartridgeId::new("com.example.t").unwrap();
        let mut resources = CartridgeResources::new(&policy);

        for _ in 0..10 {
            resources
                .surfaces
                .allocate(&owner, Surface::new(32, 32, 4096).unwrap())
                .unwrap();
        }
        for _ in 0..3 {
            resources
                .sounds
                .allocate(
                    &owner,
                    Arc::new(arc_audio::SoundData::from_stereo_samples(vec![0.0; 64])),
                )
                .unwrap();
        }
        resources.texture_memory.charge(1024).unwrap();
        assert_eq!(resources.outstanding(), 13);

        resources.destroy_all(&owner);
        assert_eq!(resources.outstanding(), 0);
        assert_eq!(resources.texture_memory.used(), 0);

        // Pools stay usable for the next load of the same cartridge.
        assert!(resources
            .surfaces
            .allocate(&owner, Surface::new(8, 8, 4096).unwrap())
            .is_ok());
    }
}
