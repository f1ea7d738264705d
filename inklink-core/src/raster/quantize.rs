//! In-place palette quantization.
//!
//! Two families with different execution shapes. Error diffusion walks
//! pixels strictly row-major because each lookup depends on error
//! written by earlier pixels. Ordered and plain nearest-color lookups
//! are independent per pixel and run row-parallel.

use super::dither::{DEFAULT_BAYER_AMPLITUDE, DiffusionKernel, DitherMode, bayer_offset};
use super::frame::Raster;
use super::palette::Palette;
use rayon::prelude::*;

/// Pushes every pixel of a raster onto a fixed palette.
#[derive(Debug, Clone)]
pub struct Quantizer {
    palette: Palette,
    mode: DitherMode,
    amplitude: f32,
}

impl Quantizer {
    pub fn new(palette: Palette, mode: DitherMode) -> Self {
        Self {
            palette,
            mode,
            amplitude: DEFAULT_BAYER_AMPLITUDE,
        }
    }

    /// Overrides the ordered-dithering perturbation amplitude.
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn mode(&self) -> DitherMode {
        self.mode
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Quantizes in place. Afterwards every pixel is exactly one
    /// palette entry.
    pub fn quantize(&self, raster: &mut Raster) {
        match self.mode.kernel() {
            Some(kernel) => self.diffuse(raster, kernel),
            None => self.map_rows(raster),
        }
    }

    /// Error diffusion over an f32 working copy of the image. The
    /// chosen color is written back immediately; the raw accumulated
    /// error feeds later lookups unclipped. Since the kernel never
    /// touches visited pixels, the working buffer ends up holding pure
    /// palette values.
    fn diffuse(&self, raster: &mut Raster, kernel: &DiffusionKernel) {
        let width = raster.width() as usize;
        let height = raster.height() as usize;
        let mut work: Vec<f32> = raster.as_bytes().iter().map(|&b| b as f32).collect();
        let inv = 1.0 / kernel.divisor as f32;

        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) * 3;
                let (r, g, b) = (work[idx], work[idx + 1], work[idx + 2]);
                let chosen = self.palette.nearest(r, g, b);
                work[idx] = chosen.r as f32;
                work[idx + 1] = chosen.g as f32;
                work[idx + 2] = chosen.b as f32;
                let err = [
                    r - chosen.r as f32,
                    g - chosen.g as f32,
                    b - chosen.b as f32,
                ];

                for (dy, row) in kernel.rows.iter().enumerate() {
                    let ny = y + dy;
                    if ny >= height {
                        break;
                    }
                    for (col, &weight) in row.iter().enumerate() {
                        if weight == 0 {
                            continue;
                        }
                        let nx = x as isize + col as isize - kernel.anchor as isize;
                        if nx < 0 || nx >= width as isize {
                            continue;
                        }
                        let nidx = (ny * width + nx as usize) * 3;
                        let scale = weight as f32 * inv;
                        work[nidx] += err[0] * scale;
                        work[nidx + 1] += err[1] * scale;
                        work[nidx + 2] += err[2] * scale;
                    }
                }
            }
        }

        for (dst, &src) in raster.as_bytes_mut().iter_mut().zip(work.iter()) {
            *dst = src.clamp(0.0, 255.0) as u8;
        }
    }

    /// Independent per-pixel mapping, parallel across rows.
    fn map_rows(&self, raster: &mut Raster) {
        let stride = raster.row_stride();
        let amplitude = self.amplitude;
        let ordered = self.mode == DitherMode::Bayer;
        let palette = &self.palette;

        raster
            .as_bytes_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let mut r = px[0] as f32;
                    let mut g = px[1] as f32;
                    let mut b = px[2] as f32;
                    if ordered {
                        let off = bayer_offset(x as u32, y as u32, amplitude);
                        r = (r + off).clamp(0.0, 255.0);
                        g = (g + off).clamp(0.0, 255.0);
                        b = (b + off).clamp(0.0, 255.0);
                    }
                    let chosen = palette.nearest(r, g, b);
                    px[0] = chosen.r;
                    px[1] = chosen.g;
                    px[2] = chosen.b;
                }
            });
    }
}
