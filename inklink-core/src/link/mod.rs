//! Transport boundary between the session protocol and the BLE stack.
//!
//! The session only ever talks to [`EpdLink`]; the btleplug-backed
//! implementation lives in [`ble`]. Tests drive the protocol through
//! scripted in-memory links.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::InkError;

pub mod ble;

pub use ble::{BleLink, DiscoveredDevice, scan};

/// One connected EPD peripheral, as the protocol sees it.
#[async_trait]
pub trait EpdLink: Send + Sync {
    /// Establishes the connection and locates the command characteristic.
    async fn connect(&mut self) -> Result<(), InkError>;

    /// Starts notification delivery. Raw payloads arrive on the
    /// returned channel in their original order.
    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, InkError>;

    /// Writes one encoded command frame, acknowledged or not.
    async fn write_command(&self, frame: &[u8], with_response: bool) -> Result<(), InkError>;

    /// Stops notification delivery.
    async fn unsubscribe(&mut self) -> Result<(), InkError>;

    /// Tears the connection down.
    async fn disconnect(&mut self) -> Result<(), InkError>;

    /// Largest payload a single write can carry. Used as the transfer
    /// unit when the device never reports one.
    fn max_payload_size(&self) -> usize;
}
