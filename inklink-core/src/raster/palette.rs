//! Fixed palettes and nearest-color lookup.

use crate::error::InkError;

/// One palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

/// An ordered fixed palette. Never empty; nearest-color ties resolve
/// to the earliest entry, so declaration order is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Black and white.
    pub fn monochrome() -> Self {
        Self {
            colors: vec![Rgb::BLACK, Rgb::WHITE],
        }
    }

    /// Black, white and red.
    pub fn tricolor() -> Self {
        Self {
            colors: vec![Rgb::BLACK, Rgb::WHITE, Rgb::RED],
        }
    }

    pub fn custom(colors: Vec<Rgb>) -> Result<Self, InkError> {
        if colors.is_empty() {
            return Err(InkError::EmptyPalette);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Nearest entry to a possibly error-shifted RGB point. Squared
    /// Euclidean distance; the first minimal entry wins.
    pub fn nearest(&self, r: f32, g: f32, b: f32) -> Rgb {
        let mut best = self.colors[0];
        let mut best_dist = f32::INFINITY;
        for &c in &self.colors {
            let dr = r - c.r as f32;
            let dg = g - c.g as f32;
            let db = b - c.b as f32;
            let dist = dr * dr + dg * dg + db * db;
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colors_map_to_themselves() {
        for palette in [Palette::monochrome(), Palette::tricolor()] {
            for &c in palette.colors() {
                assert_eq!(palette.nearest(c.r as f32, c.g as f32, c.b as f32), c);
            }
        }
    }

    #[test]
    fn ties_break_to_earliest_entry() {
        let p = Palette::monochrome();
        // Equidistant from black and white in every channel.
        assert_eq!(p.nearest(127.5, 127.5, 127.5), Rgb::BLACK);
    }

    #[test]
    fn error_shifted_points_resolve() {
        let p = Palette::tricolor();
        // Strong red with accumulated error pushing channels out of range.
        assert_eq!(p.nearest(300.0, -40.0, 12.0), Rgb::RED);
        assert_eq!(p.nearest(-10.0, 3.0, 0.0), Rgb::BLACK);
    }

    #[test]
    fn custom_rejects_empty() {
        assert!(matches!(
            Palette::custom(vec![]),
            Err(InkError::EmptyPalette)
        ));
        assert!(Palette::custom(vec![Rgb::BLACK]).is_ok());
    }
}
