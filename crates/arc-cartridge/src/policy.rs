use crate::manifest::Manifest;

/// The budgets every subsystem enforces for a running cartridge.
///
/// Produced by merging the manifest's advisory [`crate::CapsRequest`] with
/// the runtime ceilings below. The merge only ever clamps downward; a
/// manifest can shrink its own budgets but never grow past the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePolicy {
    // Scheduler.
    pub max_updates_per_frame: u32,
    pub cpu_ms_per_update: f64,
    pub hang_watchdog_ms: u64,
    /// rhai operation budget backing the hang watchdog.
    pub script_ops_per_update: u64,
    pub script_max_call_levels: usize,
    pub script_max_string_size: usize,
    pub script_max_array_size: usize,
    pub script_max_map_size: usize,

    // Storage quotas.
    pub save_bytes: u64,
    pub temp_bytes: u64,

    // Registry limits.
    pub max_surfaces: u32,
    pub max_images: u32,
    pub max_fonts: u32,
    pub max_paints: u32,
    pub max_scenes: u32,
    pub max_entities: u32,
    pub max_meshes: u32,
    pub max_materials: u32,
    pub max_textures: u32,
    pub max_cameras: u32,
    pub max_lights: u32,
    pub max_sounds: u32,
    pub max_modules: u32,
    pub texture_memory_bytes: u64,
    pub surface_pixel_budget: u64,

    // Canvas2D.
    pub path_segments_soft: u32,
    pub path_segments_hard: u32,
    pub save_stack_depth: u32,
    pub max_surface_dim: u32,

    // Audio.
    pub audio_channels: u32,

    // Input.
    pub stick_deadzone: f32,
    pub trigger_deadzone: f32,
}

impl Default for EffectivePolicy {
    /// The runtime ceilings. These are what an empty manifest gets.
    fn default() -> Self {
        Self {
            max_updates_per_frame: 4,
            cpu_ms_per_update: 12.0,
            hang_watchdog_ms: 2_000,
            script_ops_per_update: 50_000_000,
            script_max_call_levels: 128,
            script_max_string_size: 1 << 20,
            script_max_array_size: 1 << 20,
            script_max_map_size: 1 << 20,

            save_bytes: 256 << 20,
            temp_bytes: 64 << 20,

            max_surfaces: 32,
            max_images: 256,
            max_fonts: 16,
            max_paints: 256,
            max_scenes: 8,
            max_entities: 65_536,
            max_meshes: 1_024,
            max_materials: 1_024,
            max_textures: 512,
            max_cameras: 16,
            max_lights: 256,
            max_sounds: 256,
            max_modules: 16,
            texture_memory_bytes: 512 << 20,
            surface_pixel_budget: 64 << 20,

            path_segments_soft: 100_000,
            path_segments_hard: 250_000,
            save_stack_depth: 64,
            max_surface_dim: 4_096,

            audio_channels: 16,

            stick_deadzone: 0.15,
            trigger_deadzone: 0.05,
        }
    }
}

impl EffectivePolicy {
    /// Merge the manifest's advisory caps against the runtime ceilings.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let ceilings = Self::default();
        let caps = &manifest.caps;

        fn clamp_u32(requested: Option<u32>, ceiling: u32) -> u32 {
            requested.map_or(ceiling, |value| value.min(ceiling))
        }
        fn clamp_u64(requested: Option<u64>, ceiling: u64) -> u64 {
            requested.map_or(ceiling, |value| value.min(ceiling))
        }

        Self {
            audio_channels: clamp_u32(caps.audio_channels, ceilings.audio_channels).max(1),
            save_bytes: clamp_u64(caps.save_bytes, ceilings.save_bytes),
            temp_bytes: clamp_u64(caps.temp_bytes, ceilings.temp_bytes),
            max_surfaces: clamp_u32(caps.max_surfaces, ceilings.max_surfaces),
            max_images: clamp_u32(caps.max_images, ceilings.max_images),
            max_entities: clamp_u32(caps.max_entities, ceilings.max_entities),
            texture_memory_bytes: clamp_u64(
                caps.texture_memory_bytes,
                ceilings.texture_memory_bytes,
            ),
            cpu_ms_per_update: caps
                .cpu_ms_per_update
                .map_or(ceilings.cpu_ms_per_update, |value| {
                    value.min(ceilings.cpu_ms_per_update).max(0.5)
                }),
            ..ceilings
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manifest;

    fn manifest(caps: &str) -> Manifest {
        let toml = format!("id = \"a\"\napi_version = \"0.1\"\n[caps]\n{}", caps);
        Manifest::parse(Some(&toml), None).unwrap()
    }

    #[test]
    fn empty_caps_take_the_ceilings() {
        let policy = EffectivePolicy::from_manifest(&manifest(""));
        assert_eq!(policy, EffectivePolicy::default());
    }

    #[test]
    fn requests_clamp_downward_only() {
        let policy = EffectivePolicy::from_manifest(&manifest(
            "audio_channels = 4\nmax_surfaces = 999999\nsave_bytes = 1024\n",
        ));
        assert_eq!(policy.audio_channels, 4);
        // A request above the ceiling is clamped to it.
        assert_eq!(policy.max_surfaces, EffectivePolicy::default().max_surfaces);
        assert_eq!(policy.save_bytes, 1024);
    }
}
