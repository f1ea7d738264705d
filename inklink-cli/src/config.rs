//! Configuration for the image sender.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use inklink_core::FlowControl;
use inklink_core::raster::DEFAULT_BAYER_AMPLITUDE;
use inklink_core::transfer::{DEFAULT_INTERLEAVE, DEFAULT_PACING};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Device and adapter settings.
    pub device: DeviceConfig,
    /// Chunking and pacing.
    pub transfer: TransferConfig,
    /// Image preparation.
    pub render: RenderConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Device and adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Bluetooth adapter, e.g. "hci0". Empty means the first one.
    pub adapter: String,
    /// Default device address for `send` when `--address` is omitted.
    pub address: String,
    /// Seconds to wait for the config and mtu notifications.
    pub negotiation_timeout_secs: u64,
}

/// Chunking and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunks between two acknowledged writes.
    pub interleave: usize,
    /// Delay after each acknowledged write, in milliseconds.
    pub pacing_ms: u64,
}

/// Image preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Color mode: "bw" or "bwr".
    pub color_mode: String,
    /// Dither algorithm: "none", "floyd", "jarvis", "stucki",
    /// "atkinson" or "bayer".
    pub dither: String,
    /// Perturbation amplitude for ordered dithering.
    pub bayer_amplitude: f32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            transfer: TransferConfig::default(),
            render: RenderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adapter: String::new(),
            address: String::new(),
            negotiation_timeout_secs: 10,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            interleave: DEFAULT_INTERLEAVE,
            pacing_ms: DEFAULT_PACING.as_millis() as u64,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color_mode: "bw".into(),
            dither: "floyd".into(),
            bayer_amplitude: DEFAULT_BAYER_AMPLITUDE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Flow-control settings as the core type.
    pub fn flow(&self) -> FlowControl {
        FlowControl::new(
            self.transfer.interleave,
            Duration::from_millis(self.transfer.pacing_ms),
        )
    }

    /// Negotiation deadline as a `Duration`.
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.device.negotiation_timeout_secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = SenderConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("interleave"));
        assert!(text.contains("color_mode"));
        assert!(text.contains("bayer_amplitude"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = SenderConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.transfer.interleave, DEFAULT_INTERLEAVE);
        assert_eq!(parsed.render.dither, "floyd");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: SenderConfig = toml::from_str("[transfer]\ninterleave = 8\n").unwrap();
        assert_eq!(parsed.transfer.interleave, 8);
        assert_eq!(parsed.transfer.pacing_ms, 50);
        assert_eq!(parsed.render.color_mode, "bw");
    }

    #[test]
    fn flow_clamps_zero_interleave() {
        let mut cfg = SenderConfig::default();
        cfg.transfer.interleave = 0;
        assert_eq!(cfg.flow().interleave, 1);
    }
}
