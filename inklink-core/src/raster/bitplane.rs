//! Packed 1-bit plane encoding.
//!
//! A quantized raster collapses into one plane (monochrome) or two
//! planes (tri-color). Plane buffers start zeroed and bits are only
//! ever set, never cleared.

use super::frame::Raster;
use crate::error::InkError;
use std::fmt;
use std::str::FromStr;

// ── BitPlane ─────────────────────────────────────────────────────

/// One packed plane: `ceil(width/8)` bytes per row, MSB first within
/// each byte, rows padded to a byte boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPlane {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl BitPlane {
    pub fn new(width: u32, height: u32) -> Self {
        let byte_width = (width as usize).div_ceil(8);
        Self {
            width,
            height,
            bytes: vec![0; byte_width * height as usize],
        }
    }

    /// Bytes per row.
    pub fn byte_width(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Sets the bit for `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32) {
        assert!(x < self.width && y < self.height, "bit out of bounds");
        let idx = y as usize * self.byte_width() + x as usize / 8;
        self.bytes[idx] |= 1 << (7 - (x % 8));
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        assert!(x < self.width && y < self.height, "bit out of bounds");
        let idx = y as usize * self.byte_width() + x as usize / 8;
        self.bytes[idx] & (1 << (7 - (x % 8))) != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ── ColorMode ────────────────────────────────────────────────────

/// Panel color capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    /// One plane, black and white.
    #[default]
    Monochrome,
    /// Two planes, black/white/red.
    Tricolor,
}

impl ColorMode {
    pub fn plane_count(&self) -> usize {
        match self {
            ColorMode::Monochrome => 1,
            ColorMode::Tricolor => 2,
        }
    }
}

impl FromStr for ColorMode {
    type Err = InkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bw" => Ok(ColorMode::Monochrome),
            "bwr" => Ok(ColorMode::Tricolor),
            other => Err(InkError::Other(format!("unknown color mode: {other}"))),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Monochrome => f.write_str("bw"),
            ColorMode::Tricolor => f.write_str("bwr"),
        }
    }
}

// ── Classification ───────────────────────────────────────────────

/// Tri-color class of a quantized pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Black,
    White,
    Red,
}

/// Threshold classification. Anything neither fully dark nor fully
/// light counts as red, which also catches the 128 midpoint.
pub fn classify(rgb: [u8; 3]) -> PixelClass {
    let [r, g, b] = rgb;
    if r < 128 && g < 128 && b < 128 {
        PixelClass::Black
    } else if r > 128 && g > 128 && b > 128 {
        PixelClass::White
    } else {
        PixelClass::Red
    }
}

// ── Plane encoders ───────────────────────────────────────────────

/// Which transfer a plane belongs to. The first plane and the red
/// plane use different chunk header selectors on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneTag {
    Bw,
    Red,
}

/// One encoded plane ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub tag: PlaneTag,
    pub bits: BitPlane,
}

/// The fully encoded frame, planes in transfer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mode: ColorMode,
    pub planes: Vec<Plane>,
}

impl EncodedImage {
    /// Total payload bytes across all planes.
    pub fn byte_len(&self) -> usize {
        self.planes.iter().map(|p| p.bits.len()).sum()
    }
}

/// Monochrome: bit = 1 when the red channel exceeds 128 (white),
/// 0 otherwise (black). Post-quantization the channels agree, the red
/// channel is simply the fixed documented choice.
pub fn encode_mono(raster: &Raster) -> BitPlane {
    let mut plane = BitPlane::new(raster.width(), raster.height());
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            if raster.pixel(x, y)[0] > 128 {
                plane.set(x, y);
            }
        }
    }
    plane
}

/// Tri-color: black sets the R-plane bit, white sets both bits, red
/// sets the B-plane bit. Returned in transfer order (B, then R).
pub fn encode_tricolor(raster: &Raster) -> (BitPlane, BitPlane) {
    let mut plane_b = BitPlane::new(raster.width(), raster.height());
    let mut plane_r = BitPlane::new(raster.width(), raster.height());
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            match classify(raster.pixel(x, y)) {
                PixelClass::Black => plane_r.set(x, y),
                PixelClass::White => {
                    plane_b.set(x, y);
                    plane_r.set(x, y);
                }
                PixelClass::Red => plane_b.set(x, y),
            }
        }
    }
    (plane_b, plane_r)
}

/// Encodes a quantized raster into the planes the panel expects.
pub fn encode(raster: &Raster, mode: ColorMode) -> EncodedImage {
    let planes = match mode {
        ColorMode::Monochrome => vec![Plane {
            tag: PlaneTag::Bw,
            bits: encode_mono(raster),
        }],
        ColorMode::Tricolor => {
            let (b, r) = encode_tricolor(raster);
            vec![
                Plane {
                    tag: PlaneTag::Bw,
                    bits: b,
                },
                Plane {
                    tag: PlaneTag::Red,
                    bits: r,
                },
            ]
        }
    };
    EncodedImage { mode, planes }
}
