use glam::{Vec3, Vec4};

/// How a material's alpha channel is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaMode {
    Opaque,
    /// Alpha-tested against the cutoff.
    Mask { cutoff: f32 },
    /// Sorted back-to-front and blended.
    Blend,
}

/// Texture slots, stored as raw registry handle values (`0` = none).
/// baseColor and emissive sample as sRGB; the rest are linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialTextures {
    pub base_color: i64,
    pub metallic_roughness: i64,
    pub normal: i64,
    pub emissive: i64,
    pub occlusion: i64,
}

/// Metallic-roughness PBR material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color_factor: Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: Vec3,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
    pub textures: MaterialTextures,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: Vec3::ZERO,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            textures: MaterialTextures::default(),
        }
    }
}

impl Material {
    pub fn is_blended(&self) -> bool {
        matches!(self.alpha_mode, AlphaMode::Blend)
    }
}
