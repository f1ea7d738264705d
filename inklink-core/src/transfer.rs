//! Chunked plane transfer with interleaved-acknowledgment flow control.
//!
//! ## Wire format
//!
//! Each chunk rides in a `WriteImg` command:
//! ```text
//! opcode:   u8   (0x30)
//! header:   u8   (plane selector nibble | continuation nibble)
//! payload:  [u8] (transfer_unit - 1 bytes, shorter for the last chunk)
//! ```
//!
//! Most chunks are fire-and-forget writes. Every `interleave`-th chunk,
//! and unconditionally the last chunk of a plane, is an acknowledged
//! write followed by a short pacing delay. That periodic synchronization
//! bounds how far the sender can outrun the panel's buffer.

use std::time::Duration;

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use tokio::time::sleep;
use tracing::debug;

use crate::command::Command;
use crate::error::InkError;
use crate::link::EpdLink;
use crate::raster::PlaneTag;

// ── Constants ────────────────────────────────────────────────────

/// Unacknowledged chunks between two acknowledged writes.
pub const DEFAULT_INTERLEAVE: usize = 62;

/// Delay applied after every acknowledged chunk write.
pub const DEFAULT_PACING: Duration = Duration::from_millis(50);

// ── ChunkFlags ───────────────────────────────────────────────────

bitflags! {
    /// Header byte of a `WriteImg` chunk.
    ///
    /// The low nibble selects the plane: `0x0F` for the first
    /// (black/white) plane, clear for the red plane. The high nibble
    /// marks every chunk after a plane's first.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChunkFlags: u8 {
        const BLACK_PLANE = 0x0F;
        const CONTINUATION = 0xF0;
    }
}

/// Header byte for chunk `index` of a plane.
pub fn chunk_header(tag: PlaneTag, index: usize) -> u8 {
    let mut flags = match tag {
        PlaneTag::Bw => ChunkFlags::BLACK_PLANE,
        PlaneTag::Red => ChunkFlags::empty(),
    };
    if index > 0 {
        flags |= ChunkFlags::CONTINUATION;
    }
    flags.bits()
}

// ── Chunk math ───────────────────────────────────────────────────

/// Payload bytes available per chunk once the header byte is reserved.
pub fn chunk_payload_size(transfer_unit: usize) -> Result<usize, InkError> {
    match transfer_unit.checked_sub(1) {
        Some(n) if n > 0 => Ok(n),
        _ => Err(InkError::TransferUnitTooSmall {
            unit: transfer_unit,
        }),
    }
}

/// Number of chunks a buffer splits into at a given payload size.
pub fn chunk_count(buffer_len: usize, payload_size: usize) -> usize {
    buffer_len.div_ceil(payload_size)
}

// ── FlowControl ──────────────────────────────────────────────────

/// Interleaved-acknowledgment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    /// Chunk period between acknowledged writes. Clamped to at least 1.
    pub interleave: usize,
    /// Delay after each acknowledged write.
    pub pacing: Duration,
}

impl Default for FlowControl {
    fn default() -> Self {
        Self {
            interleave: DEFAULT_INTERLEAVE,
            pacing: DEFAULT_PACING,
        }
    }
}

impl FlowControl {
    pub fn new(interleave: usize, pacing: Duration) -> Self {
        Self {
            interleave: interleave.max(1),
            pacing,
        }
    }
}

// ── TransferStats ────────────────────────────────────────────────

/// Outcome counters for one plane transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub chunks: usize,
    pub acked: usize,
    pub bytes: usize,
}

// ── ChunkTransmitter ─────────────────────────────────────────────

/// Drives one encoded plane across the link.
pub struct ChunkTransmitter<'a, L: EpdLink + ?Sized> {
    link: &'a L,
    flow: FlowControl,
}

impl<'a, L: EpdLink + ?Sized> ChunkTransmitter<'a, L> {
    pub fn new(link: &'a L, flow: FlowControl) -> Self {
        Self { link, flow }
    }

    /// Sends `plane` as sequential `WriteImg` chunks sized to
    /// `transfer_unit`. Fails before the first write when the unit
    /// cannot carry any payload; any write failure aborts the plane
    /// with the failing chunk number. No chunk is ever retried.
    pub async fn transmit(
        &self,
        plane: &[u8],
        transfer_unit: usize,
        tag: PlaneTag,
    ) -> Result<TransferStats, InkError> {
        let payload_size = chunk_payload_size(transfer_unit)?;
        let total = chunk_count(plane.len(), payload_size);
        let interleave = self.flow.interleave.max(1);

        let mut stats = TransferStats::default();
        let mut until_ack = interleave;

        for (index, piece) in plane.chunks(payload_size).enumerate() {
            until_ack -= 1;
            let is_final = index + 1 == total;
            let with_ack = until_ack == 0 || is_final;

            let header = chunk_header(tag, index);
            let mut payload = BytesMut::with_capacity(1 + piece.len());
            payload.put_u8(header);
            payload.extend_from_slice(piece);
            let frame = Command::write_img(payload.freeze()).encode();

            debug!(
                chunk = index + 1,
                total,
                header = format_args!("{header:#04x}"),
                with_ack,
                "sending image chunk"
            );
            self.link
                .write_command(&frame, with_ack)
                .await
                .map_err(|e| InkError::Transfer {
                    chunk: index + 1,
                    total,
                    source: Box::new(e),
                })?;

            stats.chunks += 1;
            stats.bytes += piece.len();
            if with_ack {
                stats.acked += 1;
                until_ack = interleave;
                sleep(self.flow.pacing).await;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Records every write; optionally fails the n-th one (1-based).
    struct RecordingLink {
        writes: Mutex<Vec<(Vec<u8>, bool)>>,
        fail_at: Option<usize>,
    }

    impl RecordingLink {
        fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_at: None,
            }
        }

        fn failing_at(n: usize) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_at: Some(n),
            }
        }

        fn writes(&self) -> Vec<(Vec<u8>, bool)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EpdLink for RecordingLink {
        async fn connect(&mut self) -> Result<(), InkError> {
            Ok(())
        }

        async fn subscribe(&mut self) -> Result<mpsc::Receiver<Vec<u8>>, InkError> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        async fn write_command(&self, frame: &[u8], with_response: bool) -> Result<(), InkError> {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_at == Some(writes.len() + 1) {
                return Err(InkError::ChannelClosed);
            }
            writes.push((frame.to_vec(), with_response));
            Ok(())
        }

        async fn unsubscribe(&mut self) -> Result<(), InkError> {
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), InkError> {
            Ok(())
        }

        fn max_payload_size(&self) -> usize {
            20
        }
    }

    #[test]
    fn header_bytes() {
        assert_eq!(chunk_header(PlaneTag::Bw, 0), 0x0F);
        assert_eq!(chunk_header(PlaneTag::Bw, 1), 0xFF);
        assert_eq!(chunk_header(PlaneTag::Bw, 7), 0xFF);
        assert_eq!(chunk_header(PlaneTag::Red, 0), 0x00);
        assert_eq!(chunk_header(PlaneTag::Red, 3), 0xF0);
    }

    #[test]
    fn chunk_math() {
        assert_eq!(chunk_payload_size(20).unwrap(), 19);
        assert_eq!(chunk_count(40, 19), 3);
        assert_eq!(chunk_count(38, 19), 2);
        assert_eq!(chunk_count(1, 19), 1);
        assert!(matches!(
            chunk_payload_size(1),
            Err(InkError::TransferUnitTooSmall { unit: 1 })
        ));
        assert!(chunk_payload_size(0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn splits_buffer_into_sized_chunks() {
        let link = RecordingLink::new();
        let tx = ChunkTransmitter::new(&link, FlowControl::default());
        let plane = vec![0xAB; 40];

        let stats = tx.transmit(&plane, 20, PlaneTag::Bw).await.unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.bytes, 40);

        let writes = link.writes();
        assert_eq!(writes.len(), 3);
        // opcode + header + payload
        assert_eq!(writes[0].0.len(), 2 + 19);
        assert_eq!(writes[1].0.len(), 2 + 19);
        assert_eq!(writes[2].0.len(), 2 + 2);
        assert_eq!(writes[0].0[0], 0x30);
        assert_eq!(writes[0].0[1], 0x0F);
        assert_eq!(writes[1].0[1], 0xFF);
        assert_eq!(writes[2].0[1], 0xFF);
        // Chunks cover the buffer in order, nothing dropped.
        let body: Vec<u8> = writes.iter().flat_map(|(w, _)| w[2..].to_vec()).collect();
        assert_eq!(body, plane);
    }

    #[tokio::test(start_paused = true)]
    async fn ack_pattern_interleave_three() {
        let link = RecordingLink::new();
        let flow = FlowControl::new(3, Duration::from_millis(50));
        let tx = ChunkTransmitter::new(&link, flow);
        // 10 chunks of 9 payload bytes each at transfer_unit 10.
        let plane = vec![0u8; 90];

        let stats = tx.transmit(&plane, 10, PlaneTag::Red).await.unwrap();
        assert_eq!(stats.chunks, 10);
        assert_eq!(stats.acked, 4);

        let acked: Vec<usize> = link
            .writes()
            .iter()
            .enumerate()
            .filter(|(_, (_, ack))| *ack)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(acked, vec![3, 6, 9, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_chunk_plane_is_acknowledged() {
        let link = RecordingLink::new();
        let tx = ChunkTransmitter::new(&link, FlowControl::default());

        let stats = tx.transmit(&[1, 2, 3], 20, PlaneTag::Bw).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.acked, 1);
        assert!(link.writes()[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn tiny_transfer_unit_fails_before_writing() {
        let link = RecordingLink::new();
        let tx = ChunkTransmitter::new(&link, FlowControl::default());

        let err = tx.transmit(&[0u8; 8], 1, PlaneTag::Bw).await.unwrap_err();
        assert!(matches!(err, InkError::TransferUnitTooSmall { unit: 1 }));
        assert!(link.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_aborts_plane() {
        let link = RecordingLink::failing_at(2);
        let tx = ChunkTransmitter::new(&link, FlowControl::default());

        let err = tx.transmit(&[0u8; 40], 20, PlaneTag::Bw).await.unwrap_err();
        match err {
            InkError::Transfer { chunk, total, .. } => {
                assert_eq!(chunk, 2);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Only the first chunk made it out.
        assert_eq!(link.writes().len(), 1);
    }
}
