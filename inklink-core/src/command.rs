//! Vendor command opcodes and frame encoding.
//!
//! Uses proper enums with `TryFrom`; no panics on unknown values.
//! A frame is one opcode byte followed by the raw payload. There is no
//! length prefix: GATT writes are already delimited.

use crate::error::InkError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

// ── Opcode ───────────────────────────────────────────────────────

/// All opcodes understood by the EPD firmware.
///
/// Only `Init`, `Clear`, `Refresh` and `WriteImg` are exercised by a
/// normal session; the rest are maintenance commands the firmware
/// accepts on the same characteristic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Reconfigure the panel driver pins.
    SetPins = 0x00,
    /// Wake the panel controller and load its LUTs.
    Init = 0x01,
    /// Blank the panel RAM.
    Clear = 0x02,
    /// Flush panel RAM to the physical display.
    Refresh = 0x05,
    /// Put the panel controller into deep sleep.
    Sleep = 0x06,
    /// One chunk of bit-plane data.
    WriteImg = 0x30,
    /// Reboot the device MCU.
    SysReset = 0x91,
    /// Erase the stored pin configuration.
    CfgErase = 0x99,
}

impl TryFrom<u8> for Opcode {
    type Error = InkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Opcode::SetPins),
            0x01 => Ok(Opcode::Init),
            0x02 => Ok(Opcode::Clear),
            0x05 => Ok(Opcode::Refresh),
            0x06 => Ok(Opcode::Sleep),
            0x30 => Ok(Opcode::WriteImg),
            0x91 => Ok(Opcode::SysReset),
            0x99 => Ok(Opcode::CfgErase),
            _ => Err(InkError::UnknownVariant {
                type_name: "Opcode",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Opcode {
    /// Returns `true` if this command must be sent as an acknowledged
    /// write. `WriteImg` is governed by flow control instead, and
    /// `Sleep` is fire-and-forget since the controller stops answering.
    pub fn requires_ack(&self) -> bool {
        !matches!(self, Opcode::WriteImg | Opcode::Sleep)
    }
}

// ── Command ──────────────────────────────────────────────────────

/// A single command frame: opcode plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: Opcode,
    payload: Bytes,
}

impl Command {
    pub fn new(opcode: Opcode, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// `Init` carries no payload.
    pub fn init() -> Self {
        Self::new(Opcode::Init, Bytes::new())
    }

    /// `Clear` carries no payload.
    pub fn clear() -> Self {
        Self::new(Opcode::Clear, Bytes::new())
    }

    /// `Refresh` carries no payload.
    pub fn refresh() -> Self {
        Self::new(Opcode::Refresh, Bytes::new())
    }

    /// One image chunk: header byte plus packed plane bytes.
    pub fn write_img(chunk: impl Into<Bytes>) -> Self {
        Self::new(Opcode::WriteImg, chunk)
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serializes to the on-air layout `[opcode][payload...]`.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload.len());
        buf.put_u8(self.opcode as u8);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrip() {
        let ops = [
            Opcode::SetPins,
            Opcode::Init,
            Opcode::Clear,
            Opcode::Refresh,
            Opcode::Sleep,
            Opcode::WriteImg,
            Opcode::SysReset,
            Opcode::CfgErase,
        ];
        for op in ops {
            assert_eq!(Opcode::try_from(op as u8).unwrap(), op);
        }
    }

    #[test]
    fn opcode_invalid() {
        assert!(Opcode::try_from(0x42).is_err());
        assert!(Opcode::try_from(0xFF).is_err());
    }

    #[test]
    fn ack_classification() {
        assert!(Opcode::Init.requires_ack());
        assert!(Opcode::Clear.requires_ack());
        assert!(Opcode::Refresh.requires_ack());
        assert!(!Opcode::WriteImg.requires_ack());
        assert!(!Opcode::Sleep.requires_ack());
    }

    #[test]
    fn encode_prepends_opcode() {
        let cmd = Command::write_img(vec![0x0F, 0xAA, 0xBB]);
        assert_eq!(cmd.encode().as_ref(), &[0x30, 0x0F, 0xAA, 0xBB]);
    }

    #[test]
    fn encode_bare_command() {
        assert_eq!(Command::init().encode().as_ref(), &[0x01]);
        assert_eq!(Command::refresh().encode().as_ref(), &[0x05]);
    }
}
