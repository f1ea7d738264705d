//! Image preparation: decode, stretch to the panel, quantize, pack.

use std::path::Path;

use image::imageops::FilterType;
use tracing::info;

use inklink_core::raster::{ColorMode, EncodedImage, Palette, Quantizer, Raster, encode};
use inklink_core::{DitherMode, InkError, Resolution};

/// Pipeline settings resolved from flags and config.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub mode: ColorMode,
    pub dither: DitherMode,
    pub amplitude: f32,
}

/// Decodes `path` and prepares it for a panel of the given size. The
/// image is stretched to the exact panel dimensions, matching what the
/// panel expects rather than preserving aspect ratio.
pub fn prepare_image(
    path: &Path,
    resolution: Resolution,
    opts: RenderOptions,
) -> Result<EncodedImage, InkError> {
    let img = image::open(path)
        .map_err(|e| InkError::Other(format!("cannot open {}: {e}", path.display())))?;
    info!(path = %path.display(), %resolution, "preparing image");

    let resized = img
        .resize_exact(resolution.width, resolution.height, FilterType::Lanczos3)
        .to_rgb8();
    let mut raster = Raster::from_rgb8(resolution.width, resolution.height, resized.into_raw())?;
    quantize_raster(&mut raster, opts);
    Ok(encode(&raster, opts.mode))
}

/// Applies the palette and dithering in place.
pub fn quantize_raster(raster: &mut Raster, opts: RenderOptions) {
    let palette = match opts.mode {
        ColorMode::Monochrome => Palette::monochrome(),
        ColorMode::Tricolor => Palette::tricolor(),
    };
    Quantizer::new(palette, opts.dither)
        .with_amplitude(opts.amplitude)
        .quantize(raster);
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use inklink_core::raster::DEFAULT_BAYER_AMPLITUDE;

    fn opts(mode: ColorMode, dither: DitherMode) -> RenderOptions {
        RenderOptions {
            mode,
            dither,
            amplitude: DEFAULT_BAYER_AMPLITUDE,
        }
    }

    #[test]
    fn missing_image_file_is_reported() {
        let err = prepare_image(
            Path::new("/nonexistent/image.png"),
            Resolution::new(8, 8),
            opts(ColorMode::Monochrome, DitherMode::FloydSteinberg),
        )
        .unwrap_err();
        assert!(matches!(err, InkError::Other(_)));
    }

    #[test]
    fn quantized_raster_is_palette_pure() {
        let mut raster = Raster::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                raster.set_pixel(x, y, [(x * 16) as u8, (y * 16) as u8, 90]);
            }
        }
        quantize_raster(&mut raster, opts(ColorMode::Tricolor, DitherMode::FloydSteinberg));

        for y in 0..16 {
            for x in 0..16 {
                let px = raster.pixel(x, y);
                assert!(
                    px == [0, 0, 0] || px == [255, 255, 255] || px == [255, 0, 0],
                    "pixel {px:?} not in the tricolor palette"
                );
            }
        }
    }

    #[test]
    fn solid_image_roundtrips_through_a_file() {
        let path = std::env::temp_dir().join(format!("inklink-render-{}.png", std::process::id()));
        image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let encoded = prepare_image(
            &path,
            Resolution::new(8, 8),
            opts(ColorMode::Tricolor, DitherMode::None),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        // Solid red survives the stretch: every first-plane bit set,
        // no red-plane bits.
        assert_eq!(encoded.planes.len(), 2);
        assert!(encoded.planes[0].bits.as_bytes().iter().all(|&b| b == 0xFF));
        assert!(encoded.planes[1].bits.as_bytes().iter().all(|&b| b == 0x00));
    }
}
