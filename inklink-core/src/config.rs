//! Device configuration record and panel resolution policy.
//!
//! The first notification of a session carries a fixed 12-byte record
//! describing the driver wiring and the panel model. Everything here is
//! pure parsing; the session decides when to call it.

use crate::error::InkError;
use std::fmt;

/// Fixed length of the device config record.
pub const CONFIG_RECORD_LEN: usize = 12;

// ── Resolution ───────────────────────────────────────────────────

/// Panel size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Panel resolution for the model ids the vendor firmware ships with.
pub fn model_resolution(model_id: u8) -> Option<Resolution> {
    match model_id {
        0x00 => Some(Resolution::new(296, 128)), // 2.9"
        0x01 => Some(Resolution::new(250, 122)), // 2.13"
        0x02 => Some(Resolution::new(400, 300)), // 4.2" b/w
        0x03 => Some(Resolution::new(400, 300)), // 4.2" b/w/r
        0x04 => Some(Resolution::new(800, 480)), // 7.5" b/w/r
        _ => None,
    }
}

/// Applies the session resolution policy.
///
/// The device-resolved panel size wins whenever the model lookup
/// succeeded. An explicit width/height pair is the fallback, and only
/// counts when both halves are present. Anything less fails fast
/// instead of guessing a panel size.
pub fn resolve_resolution(
    device: Option<Resolution>,
    explicit_width: Option<u32>,
    explicit_height: Option<u32>,
) -> Result<Resolution, InkError> {
    if let Some(r) = device {
        return Ok(r);
    }
    match (explicit_width, explicit_height) {
        (Some(w), Some(h)) => Ok(Resolution::new(w, h)),
        _ => Err(InkError::ResolutionUnknown),
    }
}

// ── EpdConfig ────────────────────────────────────────────────────

/// Device-reported configuration record.
///
/// Layout: driver pins in bytes 0..=6, panel model id in byte 7,
/// auxiliary pins in bytes 8..=10, display-mode flag in byte 11.
/// Trailing bytes beyond the fixed record are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpdConfig {
    pub mosi: u8,
    pub sclk: u8,
    pub cs: u8,
    pub dc: u8,
    pub rst: u8,
    pub busy: u8,
    pub bs: u8,
    pub model_id: u8,
    pub wakeup: u8,
    pub led: u8,
    pub enable: u8,
    pub display_mode: u8,
}

impl EpdConfig {
    pub fn parse(data: &[u8]) -> Result<Self, InkError> {
        if data.len() < CONFIG_RECORD_LEN {
            return Err(InkError::MalformedConfig {
                len: data.len(),
                min: CONFIG_RECORD_LEN,
            });
        }
        Ok(Self {
            mosi: data[0],
            sclk: data[1],
            cs: data[2],
            dc: data[3],
            rst: data[4],
            busy: data[5],
            bs: data[6],
            model_id: data[7],
            wakeup: data[8],
            led: data[9],
            enable: data[10],
            display_mode: data[11],
        })
    }

    /// Panel resolution for this record, if the model id is known.
    pub fn resolution(&self) -> Option<Resolution> {
        model_resolution(self.model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_record() {
        let data = [3, 4, 5, 6, 7, 8, 9, 0x03, 10, 11, 12, 1];
        let cfg = EpdConfig::parse(&data).unwrap();
        assert_eq!(cfg.mosi, 3);
        assert_eq!(cfg.bs, 9);
        assert_eq!(cfg.model_id, 0x03);
        assert_eq!(cfg.wakeup, 10);
        assert_eq!(cfg.display_mode, 1);
        assert_eq!(cfg.resolution(), Some(Resolution::new(400, 300)));
    }

    #[test]
    fn parse_ignores_trailing_bytes() {
        let mut data = vec![0u8; CONFIG_RECORD_LEN];
        data[7] = 0x04;
        data.extend_from_slice(&[0xDE, 0xAD]);
        let cfg = EpdConfig::parse(&data).unwrap();
        assert_eq!(cfg.resolution(), Some(Resolution::new(800, 480)));
    }

    #[test]
    fn parse_short_record() {
        let err = EpdConfig::parse(&[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(
            err,
            InkError::MalformedConfig { len: 4, min: CONFIG_RECORD_LEN }
        ));
    }

    #[test]
    fn model_table() {
        assert_eq!(model_resolution(0x00), Some(Resolution::new(296, 128)));
        assert_eq!(model_resolution(0x01), Some(Resolution::new(250, 122)));
        assert_eq!(model_resolution(0x02), Some(Resolution::new(400, 300)));
        assert_eq!(model_resolution(0x04), Some(Resolution::new(800, 480)));
        assert_eq!(model_resolution(0x7F), None);
    }

    #[test]
    fn device_resolution_wins_over_explicit() {
        let r = resolve_resolution(Some(Resolution::new(296, 128)), Some(400), Some(300));
        assert_eq!(r.unwrap(), Resolution::new(296, 128));
    }

    #[test]
    fn explicit_pair_is_the_fallback() {
        let r = resolve_resolution(None, Some(400), Some(300));
        assert_eq!(r.unwrap(), Resolution::new(400, 300));
    }

    #[test]
    fn half_explicit_fails() {
        assert!(matches!(
            resolve_resolution(None, Some(400), None),
            Err(InkError::ResolutionUnknown)
        ));
        assert!(matches!(
            resolve_resolution(None, None, None),
            Err(InkError::ResolutionUnknown)
        ));
    }

    #[test]
    fn resolution_display() {
        assert_eq!(Resolution::new(296, 128).to_string(), "296x128");
    }
}
