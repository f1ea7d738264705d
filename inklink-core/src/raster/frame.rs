//! Owned RGB frame fed to the quantizer and the plane encoders.

use crate::error::InkError;

/// A tightly packed RGB8 image. Row-major, origin top-left,
/// 3 bytes per pixel, no row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Creates a raster with every pixel white.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0xFF; width as usize * height as usize * Self::BYTES_PER_PIXEL],
        }
    }

    /// Wraps an existing RGB8 buffer.
    ///
    /// Fails when the buffer length does not match `width * height * 3`.
    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, InkError> {
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(InkError::RasterSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes in one row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    /// Returns the RGB triple at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let off = self.offset(x, y);
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }

    /// Overwrites the RGB triple at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let off = self.offset(x, y);
        self.data[off..off + 3].copy_from_slice(&rgb);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_all_white() {
        let r = Raster::new(4, 2);
        assert_eq!(r.as_bytes().len(), 4 * 2 * 3);
        assert!(r.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn from_rgb8_validates_length() {
        assert!(Raster::from_rgb8(2, 2, vec![0; 12]).is_ok());
        let err = Raster::from_rgb8(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(
            err,
            InkError::RasterSize {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn pixel_roundtrip() {
        let mut r = Raster::new(3, 3);
        r.set_pixel(2, 1, [10, 20, 30]);
        assert_eq!(r.pixel(2, 1), [10, 20, 30]);
        assert_eq!(r.pixel(0, 0), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pixel_out_of_bounds_panics() {
        Raster::new(2, 2).pixel(2, 0);
    }
}
