use tiny_skia::Pixmap;

use crate::{Error, Result};

/// A CPU render target: the per-frame canvas over the console framebuffer,
/// or an offscreen surface owned by the cartridge. Premultiplied RGBA.
pub struct Surface {
    pixmap: Pixmap,
}

impl Surface {
    /// Creates a transparent surface.
    ///
    /// # Errors
    ///
    /// Zero dimensions are invalid; dimensions above `max_dim` exceed the
    /// surface size limit.
    pub fn new(width: u32, height: u32, max_dim: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSurfaceSize(width, height));
        }
        if width > max_dim || height > max_dim {
            return Err(Error::SurfaceTooLarge(width, height, max_dim));
        }
        let pixmap =
            Pixmap::new(width, height).ok_or(Error::InvalidSurfaceSize(width, height))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Resets every pixel to transparent black.
    pub fn clear_transparent(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Raw premultiplied RGBA bytes, row-major, for GPU upload.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Snapshot of the current pixels as an immutable image, used when one
    /// surface is drawn into another.
    pub fn snapshot(&self) -> CanvasImage {
        CanvasImage {
            pixmap: self.pixmap.clone(),
        }
    }
}

/// An immutable, premultiplied raster image (decoded asset or surface
/// snapshot).
pub struct CanvasImage {
    pixmap: Pixmap,
}

impl CanvasImage {
    /// Decodes PNG or JPEG bytes. Straight alpha is premultiplied here, at
    /// load, so every later composite can assume premultiplied pixels.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| Error::ImageDecode(err.to_string()))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        for pixel in data.chunks_exact_mut(4) {
            let alpha = u16::from(pixel[3]);
            pixel[0] = ((u16::from(pixel[0]) * alpha) / 255) as u8;
            pixel[1] = ((u16::from(pixel[1]) * alpha) / 255) as u8;
            pixel[2] = ((u16::from(pixel[2]) * alpha) / 255) as u8;
        }
        let size = tiny_skia::IntSize::from_wh(width, height)
            .ok_or(Error::InvalidSurfaceSize(width, height))?;
        let pixmap = Pixmap::from_vec(data, size)
            .ok_or(Error::InvalidSurfaceSize(width, height))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Estimated GPU/CPU footprint, for the texture memory budget.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height()) * 4
    }
}

impl std::fmt::Debug for CanvasImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanvasImage({}x{})", self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_limits() {
        assert!(Surface::new(0, 10, 4096).is_err());
        assert!(Surface::new(4097, 10, 4096).is_err());
        let surface = Surface::new(480, 270, 4096).unwrap();
        assert_eq!(surface.pixel_count(), 480 * 270);
    }

    #[test]
    fn decode_premultiplies() {
        // A 1x1 PNG with a half-transparent red pixel.
        let mut png = Vec::new();
        {
            let mut encoder = png_encoder(&mut png, 1, 1);
            encoder.write_image_data(&[255, 0, 0, 128]).unwrap();
        }
        let image = CanvasImage::decode(&png).unwrap();
        let pixel = image.pixmap().pixels()[0];
        // Premultiplied: r = 255 * 128 / 255 = 128.
        assert_eq!(pixel.alpha(), 128);
        assert_eq!(pixel.red(), 128);
        assert_eq!(pixel.green(), 0);
    }

    fn png_encoder(out: &mut Vec<u8>, w: u32, h: u32) -> png::Writer<&mut Vec<u8>> {
        let mut encoder = png::Encoder::new(out, w, h);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.write_header().unwrap()
    }
}
