//! Raster decoding
//!
//! Parsing of the TIFF container is delegated to the `tiff` crate. This module
//! only normalizes what it returns: samples are widened to `f32`, rearranged
//! into planar order, and the GeoTIFF model tags are turned into an extent.

use std::io::{Cursor, Read, Seek};

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, warn};

use super::types::{DecodedRaster, GeoBounds, RasterError};

/// GeoTIFF tag ids
const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;
const MODEL_TRANSFORMATION_TAG: u16 = 34264;

/// PlanarConfiguration value for band-sequential storage
const PLANAR_CONFIG_SEPARATE: u32 = 2;

/// Trait for raster decoders
pub trait RasterDecoder: Send + Sync {
    /// Decode raw bytes into planar samples
    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster, RasterError>;
}

/// Decoder for (Geo)TIFF files
pub struct TiffRasterDecoder {
    limits: Limits,
}

impl Default for TiffRasterDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffRasterDecoder {
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }
}

impl RasterDecoder for TiffRasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedRaster, RasterError> {
        let mut decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| RasterError::Decode(format!("not a valid TIFF file: {}", e)))?
            .with_limits(self.limits.clone());

        let (width, height) = decoder
            .dimensions()
            .map_err(|e| RasterError::Decode(format!("failed to read dimensions: {}", e)))?;

        let band_count = decoder
            .get_tag_u32(Tag::SamplesPerPixel)
            .map(|n| n.max(1) as usize)
            .unwrap_or(1);
        let planar = decoder
            .get_tag_u32(Tag::PlanarConfiguration)
            .map(|c| c == PLANAR_CONFIG_SEPARATE)
            .unwrap_or(false);

        let raw = if planar && band_count > 1 {
            read_planes(&mut decoder, width, height, band_count)?
        } else {
            let image = decoder.read_image().map_err(|e| {
                RasterError::Decode(format!("failed to read raster samples: {}", e))
            })?;
            widen_samples(image)
        };

        let bounds = read_geotiff_bounds(&mut decoder, width, height);

        debug!(
            "Decoded TIFF: {}x{}, {} band(s), planar={}, {} samples, bounds={:?}",
            width,
            height,
            band_count,
            planar,
            raw.len(),
            bounds
        );

        let pixels = width as usize * height as usize;
        let samples = if planar || band_count == 1 {
            raw
        } else {
            deinterleave(&raw, pixels, band_count)
        };

        Ok(DecodedRaster::planar(width, height, band_count, samples).with_bounds(bounds))
    }
}

/// Widen any TIFF sample type to f32
fn widen_samples(data: DecodingResult) -> Vec<f32> {
    match data {
        DecodingResult::U8(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::U16(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::U32(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::U64(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::I8(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::I16(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::I32(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::I64(values) => values.iter().map(|&v| v as f32).collect(),
        DecodingResult::F32(values) => values,
        DecodingResult::F64(values) => values.iter().map(|&v| v as f32).collect(),
    }
}

/// Read band-sequential samples chunk by chunk
///
/// `read_image` only returns the first plane of such files, so every strip or
/// tile is read on its own and copied into place within its band.
fn read_planes<R>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
    band_count: usize,
) -> Result<Vec<f32>, RasterError>
where
    R: Read + Seek,
{
    let (w, h) = (width as usize, height as usize);
    let pixels = w * h;
    if pixels == 0 {
        return Ok(Vec::new());
    }

    let (chunk_w, chunk_h, offsets_tag) = match decoder.get_tag_u32(Tag::TileWidth) {
        Ok(tile_width) => {
            let tile_height = decoder.get_tag_u32(Tag::TileLength).map_err(|e| {
                RasterError::Decode(format!("tiled TIFF without TileLength: {}", e))
            })?;
            (tile_width as usize, tile_height as usize, Tag::TileOffsets)
        }
        Err(_) => {
            let rows = decoder.get_tag_u32(Tag::RowsPerStrip).unwrap_or(height);
            (w, (rows as usize).min(h), Tag::StripOffsets)
        }
    };
    if chunk_w == 0 || chunk_h == 0 {
        return Err(RasterError::Decode(format!(
            "invalid chunk size {}x{}",
            chunk_w, chunk_h
        )));
    }

    let across = w.div_ceil(chunk_w);
    let per_plane = across * h.div_ceil(chunk_h);
    let chunk_count = decoder
        .get_tag_u64_vec(offsets_tag)
        .map(|offsets| offsets.len())
        .map_err(|e| RasterError::Decode(format!("missing chunk offsets: {}", e)))?;
    if chunk_count < per_plane * band_count {
        return Err(RasterError::Decode(format!(
            "expected {} chunks for {} band(s), found {}",
            per_plane * band_count,
            band_count,
            chunk_count
        )));
    }

    let mut samples = vec![0.0; pixels * band_count];
    for index in 0..per_plane * band_count {
        let values = decoder
            .read_chunk(index as u32)
            .map(widen_samples)
            .map_err(|e| RasterError::Decode(format!("failed to read chunk {}: {}", index, e)))?;

        let (band, within) = (index / per_plane, index % per_plane);
        let x0 = (within % across) * chunk_w;
        let y0 = (within / across) * chunk_h;
        let data_w = chunk_w.min(w - x0);
        let data_h = chunk_h.min(h - y0);

        // Edge chunks come back either cropped to the image or padded
        let stride = if values.len() == data_w * data_h {
            data_w
        } else {
            chunk_w
        };
        if values.len() < stride * (data_h - 1) + data_w {
            return Err(RasterError::Decode(format!(
                "chunk {} holds {} samples, expected {}",
                index,
                values.len(),
                data_w * data_h
            )));
        }

        let plane = &mut samples[band * pixels..(band + 1) * pixels];
        for row in 0..data_h {
            let src = &values[row * stride..row * stride + data_w];
            let dst = (y0 + row) * w + x0;
            plane[dst..dst + data_w].copy_from_slice(src);
        }
    }

    Ok(samples)
}

/// Rearrange pixel-interleaved samples (`RGBRGB...`) into planar order (`RR..GG..BB..`)
fn deinterleave(chunky: &[f32], pixels: usize, band_count: usize) -> Vec<f32> {
    let mut planar = vec![0.0; pixels * band_count];
    for (i, &value) in chunky.iter().enumerate().take(pixels * band_count) {
        let pixel = i / band_count;
        let band = i % band_count;
        planar[band * pixels + pixel] = value;
    }
    planar
}

/// Read the raster extent from GeoTIFF model tags
///
/// ModelTransformationTag wins over the pixel-scale + tiepoint pair. Rotated
/// transforms are reduced to their axis-aligned envelope.
fn read_geotiff_bounds<R>(decoder: &mut Decoder<R>, width: u32, height: u32) -> Option<GeoBounds>
where
    R: std::io::Read + std::io::Seek,
{
    let (w, h) = (width as f64, height as f64);

    if let Ok(m) = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION_TAG))
        && m.len() == 16
    {
        // Row-major 4x4: x = m0*col + m1*row + m3, y = m4*col + m5*row + m7
        let project = |col: f64, row: f64| (m[0] * col + m[1] * row + m[3], m[4] * col + m[5] * row + m[7]);
        let corners = [project(0.0, 0.0), project(w, 0.0), project(0.0, h), project(w, h)];
        return envelope(&corners);
    }

    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE_TAG))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT_TAG))
        .ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        warn!(
            "Ignoring malformed GeoTIFF tags: scale={:?}, tiepoint={:?}",
            scale, tiepoint
        );
        return None;
    }

    // Tiepoint (i, j, k, x, y, z) maps raster (i, j) to model (x, y); y grows northwards
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let origin_x = x - i * scale[0];
    let origin_y = y + j * scale[1];
    let corners = [
        (origin_x, origin_y),
        (origin_x + w * scale[0], origin_y - h * scale[1]),
    ];
    envelope(&corners)
}

fn envelope(points: &[(f64, f64)]) -> Option<GeoBounds> {
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let bounds = GeoBounds::from_extent([min_x, min_y, max_x, max_y]);
    bounds.is_valid().then_some(bounds)
}
