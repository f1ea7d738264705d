//! Position-based notification dispatch.
//!
//! The firmware tags nothing. The first notification of a session is
//! the config record; every later one is expected to be UTF-8 text of
//! the form `mtu=<integer>`. That rule is positional and fragile, so it
//! lives behind this one type and the session only sees typed events.

use crate::config::EpdConfig;
use tracing::warn;

/// A notification decoded into something the session acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    /// The first notification of the session. `None` means the record
    /// was malformed; the config slot is consumed either way.
    Config(Option<EpdConfig>),
    /// A `mtu=<integer>` text notification.
    TransferUnit(usize),
}

/// Routes raw notification payloads by arrival position.
#[derive(Debug, Default)]
pub struct NotificationDispatcher {
    seen: usize,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one payload. Returns `None` for notifications the
    /// session has nothing to do with (non-text, unrecognized text).
    pub fn dispatch(&mut self, payload: &[u8]) -> Option<NotificationEvent> {
        let index = self.seen;
        self.seen += 1;

        if index == 0 {
            // Whatever arrives first occupies the config slot.
            let config = match EpdConfig::parse(payload) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    warn!(error = %e, "malformed config notification, resolution left unset");
                    None
                }
            };
            return Some(NotificationEvent::Config(config));
        }

        let text = match std::str::from_utf8(payload) {
            Ok(t) => t,
            Err(_) => {
                warn!(index, "ignoring non-text notification");
                return None;
            }
        };
        match text.strip_prefix("mtu=").map(|v| v.trim().parse::<usize>()) {
            Some(Ok(unit)) => Some(NotificationEvent::TransferUnit(unit)),
            _ => {
                warn!(index, text, "ignoring unrecognized notification");
                None
            }
        }
    }
}
