use crate::{Error, Result};

/// Decoded RGBA8 texel data plus its color-space tag.
///
/// The tag is assigned by semantic role at import: baseColor and emissive
/// sample as sRGB, metallicRoughness / normal / occlusion as linear.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub srgb: bool,
}

impl TextureData {
    /// Decodes PNG or JPEG bytes.
    pub fn decode(bytes: &[u8], srgb: bool) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|err| Error::ImageDecode(err.to_string()))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
            srgb,
        })
    }

    /// A 1x1 opaque white placeholder, the sampler-neutral default.
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255, 255, 255, 255],
            srgb: false,
        }
    }

    pub fn byte_size(&self) -> u64 {
        self.rgba.len() as u64
    }
}
