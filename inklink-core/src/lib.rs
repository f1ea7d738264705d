//! # inklink-core
//!
//! Core library for driving BLE e-paper display (EPD) modules.
//!
//! This crate contains:
//! - **Command**: `Opcode` and `Command` for the EPD wire frames
//! - **Config**: panel config record parsing and the resolution policy
//! - **Notify**: position-based dispatch of device notifications
//! - **Raster**: RGB frames, palettes, dithering and bit-plane packing
//! - **Transfer**: chunking and interleaved acknowledgment flow control
//! - **Link**: the `EpdLink` trait plus the `btleplug` BLE transport
//! - **Session**: the connect → negotiate → transfer → refresh driver
//! - **Error**: the typed `InkError` hierarchy built on `thiserror`

pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod notify;
pub mod raster;
pub mod session;
pub mod transfer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use command::{Command, Opcode};
pub use config::{CONFIG_RECORD_LEN, EpdConfig, Resolution, model_resolution, resolve_resolution};
pub use error::InkError;
pub use link::{BleLink, DiscoveredDevice, EpdLink, scan};
pub use notify::{NotificationDispatcher, NotificationEvent};
pub use raster::{ColorMode, DitherMode, EncodedImage, Palette, Quantizer, Raster};
pub use session::{DeviceSession, SessionConfig, SessionPhase, SessionSummary};
pub use transfer::{ChunkTransmitter, FlowControl, TransferStats};
