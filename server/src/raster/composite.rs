//! Pixel compositing: decoded samples to RGBA bitmaps

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::types::{DecodedRaster, RasterError};

/// RGBA8 pixel buffer ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// RGBA value of pixel `index`
    pub fn pixel(&self, index: usize) -> [u8; 4] {
        let i = index * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, RasterError> {
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer)
            .write_image(
                &self.pixels,
                self.width,
                self.height,
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| RasterError::Decode(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer)
    }

    /// Encode as a `data:image/png;base64,...` URL usable as an overlay image
    pub fn to_data_url(&self) -> Result<String, RasterError> {
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

/// Builds bitmaps from decoded rasters
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    /// Gamma exponent applied to R, G and B; `None` disables correction
    gamma: Option<f64>,
}

impl Compositor {
    pub fn new(gamma: Option<f64>) -> Self {
        Self { gamma }
    }

    /// Compositor that applies no color correction
    pub fn uncorrected() -> Self {
        Self { gamma: None }
    }

    /// Convert a decoded raster to an RGBA bitmap
    ///
    /// One band (or gray + alpha) is replicated into R, G and B. Three or more
    /// bands map bands 0, 1, 2 to R, G, B. Alpha is always opaque.
    pub fn composite(&self, raster: &DecodedRaster) -> Result<Bitmap, RasterError> {
        if raster.samples.is_empty() {
            return Err(RasterError::Decode("decoder returned no raster data".into()));
        }

        let pixel_count = raster.pixel_count();
        let mut pixels = Vec::with_capacity(pixel_count * 4);

        for p in 0..pixel_count {
            let (r, g, b) = if raster.band_count >= 3 {
                (
                    to_channel(raster.sample(0, p)),
                    to_channel(raster.sample(1, p)),
                    to_channel(raster.sample(2, p)),
                )
            } else {
                let v = to_channel(raster.sample(0, p));
                (v, v, v)
            };
            pixels.extend_from_slice(&[r, g, b, 255]);
        }

        if let Some(gamma) = self.gamma {
            apply_gamma(&mut pixels, gamma);
        }

        Ok(Bitmap {
            width: raster.width,
            height: raster.height,
            pixels,
        })
    }
}

/// Round and clamp a sample into a channel byte; NaN reads as 0
fn to_channel(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// Gamma transform of a single channel value
pub fn gamma_correct(value: u8, gamma: f64) -> u8 {
    let corrected = 255.0 * (value as f64 / 255.0).powf(gamma);
    corrected.round().clamp(0.0, 255.0) as u8
}

/// Apply gamma to the R, G and B channels of an RGBA buffer in place
fn apply_gamma(pixels: &mut [u8], gamma: f64) {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = gamma_correct(v as u8, gamma);
    }
    for px in pixels.chunks_exact_mut(4) {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    }
}
