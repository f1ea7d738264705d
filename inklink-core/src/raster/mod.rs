//! # raster: image to bit-plane pipeline
//!
//! Stages between a decoded RGB image and the bytes a panel accepts:
//!
//! ```text
//! Raster ──► Quantizer ──► encode() ──► EncodedImage
//!            (palette +    (1 or 2        (planes in
//!             dithering)    bit-planes)    transfer order)
//! ```
//!
//! ## Sub-modules
//!
//! | Module     | Purpose                                        |
//! |----------- |------------------------------------------------|
//! | `frame`    | Owned tightly packed RGB8 image                |
//! | `palette`  | Fixed palettes and nearest-color lookup        |
//! | `dither`   | Diffusion kernels, Bayer matrix, mode selection|
//! | `quantize` | In-place quantization, sequential or parallel  |
//! | `bitplane` | 1-bit plane packing and color classification   |

pub mod bitplane;
pub mod dither;
pub mod frame;
pub mod palette;
pub mod quantize;

// ── Re-exports ───────────────────────────────────────────────────

pub use bitplane::{
    BitPlane, ColorMode, EncodedImage, PixelClass, Plane, PlaneTag, classify, encode,
    encode_mono, encode_tricolor,
};
pub use dither::{
    ATKINSON, BAYER_8X8, DEFAULT_BAYER_AMPLITUDE, DiffusionKernel, DitherMode, FLOYD_STEINBERG,
    JARVIS_JUDICE_NINKE, STUCKI, bayer_offset,
};
pub use frame::Raster;
pub use palette::{Palette, Rgb};
pub use quantize::Quantizer;
