//! Device session lifecycle: handshake, negotiation and the transfer
//! drive.
//!
//! A session is one-shot. It owns the link, walks the phase machine
//! below, and always releases the link on the way out, whether or not
//! the transfer succeeded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::{EpdConfig, Resolution, resolve_resolution};
use crate::error::InkError;
use crate::link::EpdLink;
use crate::notify::{NotificationDispatcher, NotificationEvent};
use crate::raster::EncodedImage;
use crate::transfer::{ChunkTransmitter, FlowControl};

// ── Constants ────────────────────────────────────────────────────

/// Deadline for the config + transfer-unit notification pair.
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Settle delay after a CLEAR command.
pub const CLEAR_SETTLE: Duration = Duration::from_secs(2);

/// Settle delay after a REFRESH command.
pub const REFRESH_SETTLE: Duration = Duration::from_secs(5);

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of an EPD session.
///
/// ```text
///  Disconnected ──► Connecting ──► Negotiating ──► Ready
///       ▲                                            │
///       │                                            ▼
///       └──── Refreshing ◄──── Transferring ◄────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// Link connection initiated but not yet established.
    Connecting,

    /// Link is up and subscribed; waiting for config and transfer unit.
    Negotiating,

    /// Negotiation complete; resolution and transfer unit are fixed.
    Ready,

    /// Image planes are being chunked across the link.
    Transferring,

    /// REFRESH issued; panel is flushing its RAM to the display.
    Refreshing,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Negotiating => write!(f, "Negotiating"),
            Self::Ready => write!(f, "Ready"),
            Self::Transferring => write!(f, "Transferring"),
            Self::Refreshing => write!(f, "Refreshing"),
        }
    }
}

impl SessionPhase {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), InkError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot connect: not in Disconnected phase",
            )),
        }
    }

    /// Valid from: `Connecting`.
    pub fn begin_negotiation(&mut self) -> Result<(), InkError> {
        match self {
            Self::Connecting => {
                *self = Self::Negotiating;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot negotiate: not in Connecting phase",
            )),
        }
    }

    /// Valid from: `Negotiating`.
    pub fn complete_negotiation(&mut self) -> Result<(), InkError> {
        match self {
            Self::Negotiating => {
                *self = Self::Ready;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot complete negotiation: not in Negotiating phase",
            )),
        }
    }

    /// Valid from: `Ready`.
    pub fn begin_transfer(&mut self) -> Result<(), InkError> {
        match self {
            Self::Ready => {
                *self = Self::Transferring;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot transfer: not in Ready phase",
            )),
        }
    }

    /// Valid from: `Transferring`.
    pub fn begin_refresh(&mut self) -> Result<(), InkError> {
        match self {
            Self::Transferring => {
                *self = Self::Refreshing;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot refresh: not in Transferring phase",
            )),
        }
    }

    /// Valid from: `Refreshing`.
    pub fn finish(&mut self) -> Result<(), InkError> {
        match self {
            Self::Refreshing => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(InkError::PhaseViolation(
                "cannot finish: not in Refreshing phase",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current phase.
    /// Teardown uses this so it can run from anywhere.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for [`DeviceSession`].
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Explicit panel width, the fallback when the device does not
    /// resolve one. Only honored together with `height`.
    pub width: Option<u32>,
    /// Explicit panel height. Only honored together with `width`.
    pub height: Option<u32>,
    /// Send CLEAR and wait [`CLEAR_SETTLE`] before transferring.
    pub clear: bool,
    /// Deadline for the notification pair during negotiation.
    pub negotiation_timeout: Duration,
    /// Chunk acknowledgment policy.
    pub flow: FlowControl,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            clear: false,
            negotiation_timeout: NEGOTIATION_TIMEOUT,
            flow: FlowControl::default(),
        }
    }
}

// ── Negotiated ───────────────────────────────────────────────────

/// What negotiation produced.
#[derive(Debug, Clone, Copy)]
pub struct Negotiated {
    /// The device config record, when one was received and parsed.
    pub config: Option<EpdConfig>,
    /// Final panel resolution after the fallback policy.
    pub resolution: Resolution,
    /// Bytes per link write, device-reported or link fallback.
    pub transfer_unit: usize,
}

// ── SessionSummary ───────────────────────────────────────────────

/// Counters for one completed session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSummary {
    pub resolution: Resolution,
    pub transfer_unit: usize,
    pub planes: usize,
    pub chunks: usize,
    pub acked: usize,
    pub bytes: usize,
}

// ── DeviceSession ────────────────────────────────────────────────

/// Owns the link and drives one full
/// connect → negotiate → transfer → refresh → disconnect pass.
pub struct DeviceSession<L: EpdLink> {
    link: L,
    config: SessionConfig,
    phase: SessionPhase,
}

impl<L: EpdLink> DeviceSession<L> {
    pub fn new(link: L) -> Self {
        Self::with_config(link, SessionConfig::default())
    }

    pub fn with_config(link: L, config: SessionConfig) -> Self {
        Self {
            link,
            config,
            phase: SessionPhase::default(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Runs the whole session. `render` is called exactly once, with
    /// the negotiated resolution, and must produce the encoded planes.
    ///
    /// The link is released unconditionally; a teardown failure never
    /// masks the error that preceded it.
    pub async fn run<F>(mut self, render: F) -> Result<SessionSummary, InkError>
    where
        F: FnOnce(Resolution) -> Result<EncodedImage, InkError>,
    {
        let outcome = self.drive(render).await;
        let teardown = self.teardown().await;
        match outcome {
            Ok(summary) => {
                teardown?;
                Ok(summary)
            }
            Err(e) => {
                if let Err(td) = teardown {
                    warn!(error = %td, "teardown failed after session error");
                }
                Err(e)
            }
        }
    }

    async fn drive<F>(&mut self, render: F) -> Result<SessionSummary, InkError>
    where
        F: FnOnce(Resolution) -> Result<EncodedImage, InkError>,
    {
        self.phase.begin_connect()?;
        info!("connecting");
        self.link.connect().await?;

        // Subscribe before INIT so the config notification cannot be
        // missed.
        let mut notifications = self.link.subscribe().await?;
        self.phase.begin_negotiation()?;
        let negotiated = self.negotiate(&mut notifications).await?;
        self.phase.complete_negotiation()?;
        info!(
            resolution = %negotiated.resolution,
            transfer_unit = negotiated.transfer_unit,
            "session ready"
        );

        self.phase.begin_transfer()?;
        if self.config.clear {
            info!("clearing panel");
            self.send_command(&Command::clear()).await?;
            sleep(CLEAR_SETTLE).await;
        }

        let image = render(negotiated.resolution)?;
        let mut summary = SessionSummary {
            resolution: negotiated.resolution,
            transfer_unit: negotiated.transfer_unit,
            planes: 0,
            chunks: 0,
            acked: 0,
            bytes: 0,
        };

        let transmitter = ChunkTransmitter::new(&self.link, self.config.flow);
        for plane in &image.planes {
            debug!(tag = ?plane.tag, bytes = plane.bits.len(), "transferring plane");
            let stats = transmitter
                .transmit(plane.bits.as_bytes(), negotiated.transfer_unit, plane.tag)
                .await?;
            summary.planes += 1;
            summary.chunks += stats.chunks;
            summary.acked += stats.acked;
            summary.bytes += stats.bytes;
        }

        self.phase.begin_refresh()?;
        info!("refreshing panel");
        self.send_command(&Command::refresh()).await?;
        sleep(REFRESH_SETTLE).await;
        self.phase.finish()?;
        Ok(summary)
    }

    /// Writes one command frame, acknowledged or not per its opcode.
    async fn send_command(&self, command: &Command) -> Result<(), InkError> {
        self.link
            .write_command(&command.encode(), command.opcode().requires_ack())
            .await
    }

    /// Sends INIT and consumes notifications until both the config
    /// slot and the transfer unit have arrived or the deadline lapses.
    /// A timeout falls back to documented defaults instead of failing;
    /// only an unresolvable panel size is fatal.
    async fn negotiate(
        &self,
        notifications: &mut mpsc::Receiver<Vec<u8>>,
    ) -> Result<Negotiated, InkError> {
        info!("requesting device config");
        self.send_command(&Command::init()).await?;

        let deadline = Instant::now() + self.config.negotiation_timeout;
        let mut dispatcher = NotificationDispatcher::new();
        let mut device_config: Option<EpdConfig> = None;
        let mut config_seen = false;
        let mut transfer_unit: Option<usize> = None;

        while !(config_seen && transfer_unit.is_some()) {
            let payload = match timeout_at(deadline, notifications.recv()).await {
                Ok(Some(payload)) => payload,
                Ok(None) => return Err(InkError::ChannelClosed),
                Err(_) => {
                    warn!(
                        timeout = ?self.config.negotiation_timeout,
                        "negotiation timed out, falling back to defaults"
                    );
                    break;
                }
            };
            match dispatcher.dispatch(&payload) {
                Some(NotificationEvent::Config(cfg)) => {
                    config_seen = true;
                    if let Some(c) = &cfg {
                        match c.resolution() {
                            Some(res) => info!(
                                model = format_args!("{:#04x}", c.model_id),
                                resolution = %res,
                                "device config received"
                            ),
                            None => warn!(
                                model = format_args!("{:#04x}", c.model_id),
                                "unknown panel model, resolution not set"
                            ),
                        }
                    }
                    device_config = cfg;
                }
                Some(NotificationEvent::TransferUnit(unit)) => {
                    debug!(unit, "device reported transfer unit");
                    transfer_unit = Some(unit);
                }
                None => {}
            }
        }

        let device_resolution = device_config.and_then(|c| c.resolution());
        let resolution =
            resolve_resolution(device_resolution, self.config.width, self.config.height)?;
        let transfer_unit = transfer_unit.unwrap_or_else(|| self.link.max_payload_size());

        Ok(Negotiated {
            config: device_config,
            resolution,
            transfer_unit,
        })
    }

    /// Releases the link. Runs from any phase; unsubscribe and
    /// disconnect are both always attempted.
    async fn teardown(&mut self) -> Result<(), InkError> {
        self.phase.force_disconnect();
        let unsubscribed = self.link.unsubscribe().await;
        let disconnected = self.link.disconnect().await;
        if unsubscribed.is_ok() && disconnected.is_ok() {
            info!("disconnected");
        }
        unsubscribed.and(disconnected)
    }
}
