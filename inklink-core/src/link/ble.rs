//! btleplug-backed implementation of [`EpdLink`].
//!
//! The vendor firmware exposes one service with one characteristic
//! that carries commands downstream and notifications upstream. A
//! spawned forwarder task moves notification payloads onto an mpsc
//! channel so the session can consume them without callbacks.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::EpdLink;
use crate::error::InkError;

// ── Constants ────────────────────────────────────────────────────

/// Vendor EPD service.
pub const EPD_SERVICE: Uuid = Uuid::from_u128(0x62750001_d828_918d_fb46_b6c11c675aec);

/// Command/notification characteristic inside [`EPD_SERVICE`].
pub const EPD_CHARACTERISTIC: Uuid = Uuid::from_u128(0x62750002_d828_918d_fb46_b6c11c675aec);

/// ATT default MTU (23) minus the 3-byte write header. The safe floor
/// when the device never reports a transfer unit.
pub const DEFAULT_MAX_PAYLOAD: usize = 20;

/// How long `open` keeps scanning for the requested address.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(10);

/// Poll interval while scanning for the requested address.
const DISCOVERY_POLL: Duration = Duration::from_millis(500);

// ── Discovery ────────────────────────────────────────────────────

/// A peripheral seen during a scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
}

async fn pick_adapter(adapter_name: Option<&str>) -> Result<Adapter, InkError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    match adapter_name {
        None => adapters
            .into_iter()
            .next()
            .ok_or_else(|| InkError::AdapterUnavailable("no adapters present".into())),
        Some(name) => {
            for adapter in adapters {
                let info = adapter.adapter_info().await?;
                if info.contains(name) {
                    return Ok(adapter);
                }
            }
            Err(InkError::AdapterUnavailable(name.to_string()))
        }
    }
}

/// Scans for `duration` and returns every peripheral seen.
pub async fn scan(
    adapter_name: Option<&str>,
    duration: Duration,
) -> Result<Vec<DiscoveredDevice>, InkError> {
    let adapter = pick_adapter(adapter_name).await?;
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(duration).await;

    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let Some(props) = peripheral.properties().await? else {
            continue;
        };
        devices.push(DiscoveredDevice {
            address: props.address.to_string(),
            name: props.local_name,
        });
    }
    adapter.stop_scan().await?;
    Ok(devices)
}

/// The platform id is matched as a substring so CoreBluetooth UUIDs
/// work even though the id renders with wrapper text.
fn address_matches(wanted: &str, address: &str, id: &str) -> bool {
    address.eq_ignore_ascii_case(wanted) || id.to_lowercase().contains(&wanted.to_lowercase())
}

async fn find_peripheral(adapter: &Adapter, address: &str) -> Result<Peripheral, InkError> {
    adapter.start_scan(ScanFilter::default()).await?;
    let deadline = tokio::time::Instant::now() + DISCOVERY_WINDOW;

    let found = 'search: loop {
        for peripheral in adapter.peripherals().await? {
            let id = format!("{:?}", peripheral.id());
            let addr = match peripheral.properties().await? {
                Some(props) => props.address.to_string(),
                None => continue,
            };
            if address_matches(address, &addr, &id) {
                break 'search Some(peripheral);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            break None;
        }
        sleep(DISCOVERY_POLL).await;
    };

    adapter.stop_scan().await?;
    found.ok_or_else(|| InkError::DeviceNotFound(address.to_string()))
}

// ── BleLink ──────────────────────────────────────────────────────

/// A GATT connection to one EPD peripheral.
pub struct BleLink {
    peripheral: Peripheral,
    characteristic: Option<Characteristic>,
    forwarder: Option<JoinHandle<()>>,
    max_payload: usize,
}

impl BleLink {
    /// Scans on the chosen adapter until `address` shows up and wraps
    /// the peripheral. Does not connect yet.
    pub async fn open(address: &str, adapter_name: Option<&str>) -> Result<Self, InkError> {
        let adapter = pick_adapter(adapter_name).await?;
        info!(address, "searching for device");
        let peripheral = find_peripheral(&adapter, address).await?;
        Ok(Self {
            peripheral,
            characteristic: None,
            forwarder: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
        })
    }

    /// Overrides the fallback transfer unit reported by
    /// [`EpdLink::max_payload_size`].
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    fn characteristic(&self) -> Result<&Characteristic, InkError> {
        self.characteristic
            .as_ref()
            .ok_or(InkError::CharacteristicMissing)
    }
}

#[async_trait]
impl EpdLink for BleLink {
    async fn connect(&mut self) -> Result<(), InkError> {
        self.peripheral.connect().await?;
        self.peripheral.discover_services().await?;
        let characteristic = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == EPD_CHARACTERISTIC)
            .ok_or(InkError::CharacteristicMissing)?;
        debug!(service = %EPD_SERVICE, "located EPD characteristic");
        self.characteristic = Some(characteristic);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, InkError> {
        let characteristic = self.characteristic()?.clone();
        self.peripheral.subscribe(&characteristic).await?;
        let mut stream = self.peripheral.notifications().await?;

        let (tx, rx) = mpsc::channel(100);
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != EPD_CHARACTERISTIC {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    // Receiver dropped, stop forwarding.
                    break;
                }
            }
        });
        self.forwarder = Some(handle);
        Ok(rx)
    }

    async fn write_command(&self, frame: &[u8], with_response: bool) -> Result<(), InkError> {
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(self.characteristic()?, frame, write_type)
            .await?;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), InkError> {
        if let Some(characteristic) = self.characteristic.clone() {
            self.peripheral.unsubscribe(&characteristic).await?;
        }
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), InkError> {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        match self.peripheral.is_connected().await {
            Ok(true) => self.peripheral.disconnect().await.map_err(InkError::from),
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(error = %e, "connection state query failed, attempting disconnect anyway");
                self.peripheral.disconnect().await.map_err(InkError::from)
            }
        }
    }

    fn max_payload_size(&self) -> usize {
        self.max_payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_share_the_vendor_base() {
        let service = EPD_SERVICE.as_u128();
        let characteristic = EPD_CHARACTERISTIC.as_u128();
        // Only the short-id portion differs.
        let mask = !(0xFFFFu128 << 96);
        assert_eq!(service & mask, characteristic & mask);
        assert_eq!((service >> 96) & 0xFFFF, 0x0001);
        assert_eq!((characteristic >> 96) & 0xFFFF, 0x0002);
    }

    #[test]
    fn address_matching_ignores_case() {
        assert!(address_matches(
            "c4:5d:83:aa:bb:cc",
            "C4:5D:83:AA:BB:CC",
            "some-id"
        ));
        assert!(address_matches(
            "ABCD-1234",
            "00:00:00:00:00:00",
            "PeripheralId(abcd-1234)"
        ));
        assert!(!address_matches("c4:5d:83:aa:bb:cc", "C4:5D:83:AA:BB:CD", "x"));
    }
}
