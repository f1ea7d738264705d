//! Dithering algorithm tables and selection.

use crate::error::InkError;
use std::fmt;
use std::str::FromStr;

// ── Error-diffusion kernels ──────────────────────────────────────

/// An error-diffusion kernel.
///
/// `rows[0]` is the current row and `anchor` is the current pixel's
/// column within each row. Entries at or left of the anchor in row 0
/// are zero, so error only ever reaches unvisited pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffusionKernel {
    pub name: &'static str,
    pub rows: &'static [&'static [u8]],
    pub anchor: usize,
    pub divisor: u16,
}

pub const FLOYD_STEINBERG: DiffusionKernel = DiffusionKernel {
    name: "floyd-steinberg",
    rows: &[&[0, 0, 7], &[3, 5, 1]],
    anchor: 1,
    divisor: 16,
};

pub const JARVIS_JUDICE_NINKE: DiffusionKernel = DiffusionKernel {
    name: "jarvis-judice-ninke",
    rows: &[&[0, 0, 0, 7, 5], &[3, 5, 7, 5, 3], &[1, 3, 5, 3, 1]],
    anchor: 2,
    divisor: 48,
};

pub const STUCKI: DiffusionKernel = DiffusionKernel {
    name: "stucki",
    rows: &[&[0, 0, 0, 8, 4], &[2, 4, 8, 4, 2], &[1, 2, 4, 2, 1]],
    anchor: 2,
    divisor: 42,
};

/// Atkinson diffuses only six eighths of the error; the rest is
/// discarded, which lightens shadows on small panels.
pub const ATKINSON: DiffusionKernel = DiffusionKernel {
    name: "atkinson",
    rows: &[&[0, 0, 1, 1], &[1, 1, 1, 0], &[0, 1, 0, 0]],
    anchor: 1,
    divisor: 8,
};

// ── Ordered threshold matrix ─────────────────────────────────────

/// The 8x8 Bayer index matrix, a permutation of 0..=63.
pub const BAYER_8X8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Default perturbation amplitude for ordered dithering. An empirical
/// tuning value, kept overridable.
pub const DEFAULT_BAYER_AMPLITUDE: f32 = 50.0;

/// Per-pixel perturbation added to each channel before the
/// nearest-color lookup. Centered on zero, spans one amplitude.
pub fn bayer_offset(x: u32, y: u32, amplitude: f32) -> f32 {
    let m = BAYER_8X8[(y % 8) as usize][(x % 8) as usize] as f32;
    (m / 64.0 - 0.5) * amplitude
}

// ── DitherMode ───────────────────────────────────────────────────

/// Selects how pixels are pushed onto the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DitherMode {
    /// Plain nearest-color lookup, no perturbation.
    None,
    #[default]
    FloydSteinberg,
    JarvisJudiceNinke,
    Stucki,
    Atkinson,
    /// Ordered dithering with the 8x8 Bayer matrix.
    Bayer,
}

impl DitherMode {
    /// Whether pixels can be processed independently of each other.
    /// False for the diffusion family, which has a read-after-write
    /// dependency on neighbouring pixels and must run sequentially.
    pub fn is_order_independent(&self) -> bool {
        matches!(self, DitherMode::None | DitherMode::Bayer)
    }

    /// The diffusion kernel behind this mode, if it has one.
    pub fn kernel(&self) -> Option<&'static DiffusionKernel> {
        match self {
            DitherMode::FloydSteinberg => Some(&FLOYD_STEINBERG),
            DitherMode::JarvisJudiceNinke => Some(&JARVIS_JUDICE_NINKE),
            DitherMode::Stucki => Some(&STUCKI),
            DitherMode::Atkinson => Some(&ATKINSON),
            DitherMode::None | DitherMode::Bayer => None,
        }
    }
}

impl FromStr for DitherMode {
    type Err = InkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DitherMode::None),
            "floyd" | "floyd-steinberg" => Ok(DitherMode::FloydSteinberg),
            "jarvis" | "jarvis-judice-ninke" => Ok(DitherMode::JarvisJudiceNinke),
            "stucki" => Ok(DitherMode::Stucki),
            "atkinson" => Ok(DitherMode::Atkinson),
            "bayer" => Ok(DitherMode::Bayer),
            other => Err(InkError::Other(format!("unknown dither mode: {other}"))),
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DitherMode::None => "none",
            DitherMode::FloydSteinberg => "floyd",
            DitherMode::JarvisJudiceNinke => "jarvis",
            DitherMode::Stucki => "stucki",
            DitherMode::Atkinson => "atkinson",
            DitherMode::Bayer => "bayer",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(k: &DiffusionKernel) -> u32 {
        k.rows
            .iter()
            .flat_map(|row| row.iter())
            .map(|&w| w as u32)
            .sum()
    }

    #[test]
    fn kernel_weight_sums() {
        assert_eq!(weight_sum(&FLOYD_STEINBERG), 16);
        assert_eq!(weight_sum(&JARVIS_JUDICE_NINKE), 48);
        assert_eq!(weight_sum(&STUCKI), 42);
        // Atkinson keeps two eighths of the error undistributed.
        assert_eq!(weight_sum(&ATKINSON), 6);
        assert_eq!(ATKINSON.divisor, 8);
    }

    #[test]
    fn kernels_never_touch_visited_pixels() {
        for k in [&FLOYD_STEINBERG, &JARVIS_JUDICE_NINKE, &STUCKI, &ATKINSON] {
            for (col, &w) in k.rows[0].iter().enumerate() {
                if col <= k.anchor {
                    assert_eq!(w, 0, "{}: row 0 col {col} must be zero", k.name);
                }
            }
        }
    }

    #[test]
    fn bayer_is_a_permutation() {
        let mut seen = [false; 64];
        for row in BAYER_8X8 {
            for v in row {
                assert!(!seen[v as usize], "duplicate entry {v}");
                seen[v as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn bayer_offset_is_centered() {
        let amplitude = 64.0;
        assert_eq!(bayer_offset(0, 0, amplitude), -32.0);
        for y in 0..8 {
            for x in 0..8 {
                let off = bayer_offset(x, y, DEFAULT_BAYER_AMPLITUDE);
                assert!(off.abs() <= DEFAULT_BAYER_AMPLITUDE / 2.0);
            }
        }
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("floyd".parse::<DitherMode>().unwrap(), DitherMode::FloydSteinberg);
        assert_eq!("BAYER".parse::<DitherMode>().unwrap(), DitherMode::Bayer);
        assert_eq!("none".parse::<DitherMode>().unwrap(), DitherMode::None);
        assert!("ostromoukhov".parse::<DitherMode>().is_err());
    }

    #[test]
    fn order_independence_split() {
        assert!(DitherMode::None.is_order_independent());
        assert!(DitherMode::Bayer.is_order_independent());
        assert!(!DitherMode::FloydSteinberg.is_order_independent());
        assert!(!DitherMode::Atkinson.is_order_independent());
    }

    #[test]
    fn display_matches_parse() {
        for mode in [
            DitherMode::None,
            DitherMode::FloydSteinberg,
            DitherMode::JarvisJudiceNinke,
            DitherMode::Stucki,
            DitherMode::Atkinson,
            DitherMode::Bayer,
        ] {
            assert_eq!(mode.to_string().parse::<DitherMode>().unwrap(), mode);
        }
    }
}
