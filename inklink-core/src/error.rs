//! Error types for the inklink protocol and raster pipeline.
//!
//! All fallible operations return `Result<T, InkError>`.
//! No panics on invalid input; every failure is typed.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the inklink library.
#[derive(Debug, Error)]
pub enum InkError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A device config notification was too short to parse.
    #[error("malformed config record: {len} bytes (need {min})")]
    MalformedConfig { len: usize, min: usize },

    /// A session method was called in the wrong phase.
    #[error("phase violation: {0}")]
    PhaseViolation(&'static str),

    // ── Configuration Errors ─────────────────────────────────────
    /// Neither the device model nor the caller supplied a usable panel size.
    #[error("panel resolution unknown: no model match and no explicit size")]
    ResolutionUnknown,

    /// The negotiated transfer unit leaves no room for a chunk payload.
    #[error("transfer unit too small: {unit} bytes")]
    TransferUnitTooSmall { unit: usize },

    /// A raster buffer did not match its stated dimensions.
    #[error("raster size mismatch: expected {expected} bytes, got {actual}")]
    RasterSize { expected: usize, actual: usize },

    /// A palette with no entries cannot quantize anything.
    #[error("empty palette")]
    EmptyPalette,

    // ── Transfer Errors ──────────────────────────────────────────
    /// A chunk write failed mid-plane. The frame on the panel is garbage
    /// until a full resend; the session is not resumable.
    #[error("transfer failed at chunk {chunk}/{total}: {source}")]
    Transfer {
        chunk: usize,
        total: usize,
        #[source]
        source: Box<InkError>,
    },

    // ── Link Errors ──────────────────────────────────────────────
    /// The BLE layer reported an error.
    #[error("link error: {0}")]
    Link(#[from] btleplug::Error),

    /// No Bluetooth adapter matched the request.
    #[error("no bluetooth adapter: {0}")]
    AdapterUnavailable(String),

    /// No peripheral matched the requested address.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The peripheral does not expose the EPD command characteristic.
    #[error("EPD characteristic missing on peer")]
    CharacteristicMissing,

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for InkError {
    fn from(s: String) -> Self {
        InkError::Other(s)
    }
}

impl From<&str> for InkError {
    fn from(s: &str) -> Self {
        InkError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for InkError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        InkError::ChannelClosed
    }
}
