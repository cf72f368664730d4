//! Chunked transfer reassembly
//!
//! The link delivers a transfer as a series of chunks of at most one MTU.
//! The first chunk of a transfer starts with the 4-byte length prefix; the
//! reassembler reads it, allocates exactly that many bytes, and copies each
//! following chunk in arrival order until the buffer is full.
//!
//! A header split across two chunks is not coalesced: a first chunk shorter
//! than the prefix is rejected as [`TransferError::HeaderTooShort`].

use crate::constants::{DEFAULT_MAX_PAYLOAD_BYTES, HEADER_LEN};
use crate::error::TransferError;
use crate::protocol::frame::read_header;

/// A fully reassembled transfer
#[derive(Debug, PartialEq, Eq)]
pub struct Payload {
    /// Monotonic transfer number for this reassembler
    pub sequence: u64,
    /// Exactly `expected_length` bytes, in arrival order
    pub data: Box<[u8]>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of ingesting one chunk
#[derive(Debug, PartialEq, Eq)]
pub enum Ingest {
    /// More bytes are needed
    Incomplete,
    /// The transfer is complete; the reassembler is awaiting a new header
    Completed(Payload),
}

enum Phase {
    AwaitingHeader,
    Receiving { expected: usize, buffer: Vec<u8> },
}

/// Per-connection reassembly state
pub struct FrameReassembler {
    phase: Phase,
    /// Largest payload a header may announce
    max_payload: usize,
    next_sequence: u64,
    transfers_started: u64,
    transfers_completed: u64,
    transfers_aborted: u64,
    bytes_received: u64,
}

impl FrameReassembler {
    pub fn new(max_payload: usize) -> Self {
        Self {
            phase: Phase::AwaitingHeader,
            max_payload,
            next_sequence: 0,
            transfers_started: 0,
            transfers_completed: 0,
            transfers_aborted: 0,
            bytes_received: 0,
        }
    }

    /// Ingest one chunk from the link.
    ///
    /// Errors abort the current transfer and leave the reassembler awaiting a
    /// new header; none of them needs handling beyond reporting.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<Ingest, TransferError> {
        if chunk.is_empty() {
            return Ok(Ingest::Incomplete);
        }

        let mut data = chunk;
        if let Phase::AwaitingHeader = self.phase {
            let expected = read_header(chunk)
                .ok_or(TransferError::HeaderTooShort { len: chunk.len() })?
                as usize;
            if expected == 0 {
                return Err(TransferError::ZeroLengthPayload);
            }
            self.phase = Phase::Receiving {
                expected,
                buffer: self.allocate(expected)?,
            };
            self.transfers_started += 1;
            tracing::info!("Incoming transfer of {} bytes", expected);
            data = &chunk[HEADER_LEN..];
        }

        let Phase::Receiving { expected, buffer } = &mut self.phase else {
            return Ok(Ingest::Incomplete);
        };

        let space_left = *expected - buffer.len();
        if data.len() > space_left {
            let err = TransferError::Overrun {
                expected: *expected,
                received: buffer.len() + data.len(),
            };
            self.abort();
            return Err(err);
        }

        buffer.extend_from_slice(data);
        self.bytes_received += data.len() as u64;
        tracing::debug!("Transfer progress {}/{} bytes", buffer.len(), expected);

        if buffer.len() < *expected {
            return Ok(Ingest::Incomplete);
        }

        let Phase::Receiving { buffer, .. } =
            std::mem::replace(&mut self.phase, Phase::AwaitingHeader)
        else {
            return Ok(Ingest::Incomplete);
        };
        let payload = Payload {
            sequence: self.next_sequence,
            data: buffer.into_boxed_slice(),
        };
        self.next_sequence += 1;
        self.transfers_completed += 1;
        tracing::info!("Transfer {} complete ({} bytes)", payload.sequence, payload.len());
        Ok(Ingest::Completed(payload))
    }

    fn allocate(&self, expected: usize) -> Result<Vec<u8>, TransferError> {
        if expected > self.max_payload {
            return Err(TransferError::OutOfMemory { requested: expected });
        }
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(expected)
            .map_err(|_| TransferError::OutOfMemory { requested: expected })?;
        Ok(buffer)
    }

    fn abort(&mut self) {
        self.phase = Phase::AwaitingHeader;
        self.transfers_aborted += 1;
    }

    /// Drop any partial transfer and await a new header.
    /// Returns the number of buffered bytes that were discarded, if any.
    pub fn reset(&mut self) -> Option<usize> {
        match std::mem::replace(&mut self.phase, Phase::AwaitingHeader) {
            Phase::AwaitingHeader => None,
            Phase::Receiving { buffer, .. } => {
                self.transfers_aborted += 1;
                Some(buffer.len())
            }
        }
    }

    /// True when the next chunk is expected to start with a header
    pub fn is_awaiting_header(&self) -> bool {
        matches!(self.phase, Phase::AwaitingHeader)
    }

    /// Payload size announced by the current header; 0 while awaiting one
    pub fn expected_length(&self) -> usize {
        match &self.phase {
            Phase::AwaitingHeader => 0,
            Phase::Receiving { expected, .. } => *expected,
        }
    }

    /// Bytes accumulated for the current transfer
    pub fn received_count(&self) -> usize {
        match &self.phase {
            Phase::AwaitingHeader => 0,
            Phase::Receiving { buffer, .. } => buffer.len(),
        }
    }

    pub fn stats(&self) -> ReassemblyStats {
        ReassemblyStats {
            transfers_started: self.transfers_started,
            transfers_completed: self.transfers_completed,
            transfers_aborted: self.transfers_aborted,
            bytes_received: self.bytes_received,
        }
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

/// Reassembly statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub transfers_aborted: u64,
    pub bytes_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ten_bytes() -> Vec<u8> {
        (0u8..10).collect()
    }

    fn expect_completed(result: Result<Ingest, TransferError>) -> Payload {
        match result {
            Ok(Ingest::Completed(payload)) => payload,
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_single_chunk_transfer() {
        let mut reassembler = FrameReassembler::default();
        let mut chunk = vec![10, 0, 0, 0];
        chunk.extend(ten_bytes());

        let payload = expect_completed(reassembler.ingest(&chunk));
        assert_eq!(&payload.data[..], &ten_bytes()[..]);
        assert_eq!(payload.sequence, 0);
        assert!(reassembler.is_awaiting_header());
        assert_eq!(reassembler.expected_length(), 0);
    }

    #[test]
    fn test_split_transfer_matches_single_chunk() {
        let mut reassembler = FrameReassembler::default();
        let first = [10, 0, 0, 0, 0x00, 0x01];
        let second = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];

        assert_eq!(reassembler.ingest(&first), Ok(Ingest::Incomplete));
        assert_eq!(reassembler.expected_length(), 10);
        assert_eq!(reassembler.received_count(), 2);

        let payload = expect_completed(reassembler.ingest(&second));
        assert_eq!(&payload.data[..], &ten_bytes()[..]);
    }

    #[test]
    fn test_header_only_first_chunk() {
        let mut reassembler = FrameReassembler::default();
        assert_eq!(reassembler.ingest(&[3, 0, 0, 0]), Ok(Ingest::Incomplete));
        assert_eq!(reassembler.received_count(), 0);
        let payload = expect_completed(reassembler.ingest(&[7, 8, 9]));
        assert_eq!(&payload.data[..], &[7, 8, 9]);
    }

    #[test]
    fn test_overrun_aborts_transfer() {
        let mut reassembler = FrameReassembler::default();
        let chunk = [5, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7];

        assert_eq!(
            reassembler.ingest(&chunk),
            Err(TransferError::Overrun { expected: 5, received: 7 })
        );
        assert!(reassembler.is_awaiting_header());
        assert_eq!(reassembler.received_count(), 0);
        assert_eq!(reassembler.stats().transfers_aborted, 1);
        assert_eq!(reassembler.stats().transfers_completed, 0);
    }

    #[test]
    fn test_overrun_on_later_chunk() {
        let mut reassembler = FrameReassembler::default();
        assert_eq!(reassembler.ingest(&[4, 0, 0, 0, 1, 2]), Ok(Ingest::Incomplete));
        assert!(matches!(
            reassembler.ingest(&[3, 4, 5]),
            Err(TransferError::Overrun { expected: 4, received: 5 })
        ));
        // The next chunk is parsed as a fresh header
        let payload = expect_completed(reassembler.ingest(&[1, 0, 0, 0, 42]));
        assert_eq!(&payload.data[..], &[42]);
    }

    #[test]
    fn test_short_header_dropped() {
        let mut reassembler = FrameReassembler::default();
        assert_eq!(
            reassembler.ingest(&[10, 0]),
            Err(TransferError::HeaderTooShort { len: 2 })
        );
        assert!(reassembler.is_awaiting_header());
        assert_eq!(reassembler.stats().transfers_started, 0);
    }

    #[test]
    fn test_zero_length_ignored() {
        let mut reassembler = FrameReassembler::default();
        assert_eq!(
            reassembler.ingest(&[0, 0, 0, 0, 1, 2]),
            Err(TransferError::ZeroLengthPayload)
        );
        assert!(reassembler.is_awaiting_header());
    }

    #[test]
    fn test_oversized_header_is_out_of_memory() {
        let mut reassembler = FrameReassembler::new(16);
        assert_eq!(
            reassembler.ingest(&[17, 0, 0, 0]),
            Err(TransferError::OutOfMemory { requested: 17 })
        );
        assert!(reassembler.is_awaiting_header());
        assert_eq!(reassembler.expected_length(), 0);
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut reassembler = FrameReassembler::default();
        assert_eq!(reassembler.ingest(&[]), Ok(Ingest::Incomplete));
        assert!(reassembler.is_awaiting_header());

        reassembler.ingest(&[2, 0, 0, 0, 1]).unwrap();
        assert_eq!(reassembler.ingest(&[]), Ok(Ingest::Incomplete));
        assert_eq!(reassembler.received_count(), 1);
    }

    #[test]
    fn test_reset_discards_partial_buffer() {
        let mut reassembler = FrameReassembler::default();
        reassembler.ingest(&[10, 0, 0, 0, 0, 1, 2, 3, 4]).unwrap();
        assert_eq!(reassembler.received_count(), 5);

        assert_eq!(reassembler.reset(), Some(5));
        assert!(reassembler.is_awaiting_header());
        assert_eq!(reassembler.reset(), None);
    }

    #[test]
    fn test_sequences_increment() {
        let mut reassembler = FrameReassembler::default();
        let a = expect_completed(reassembler.ingest(&[1, 0, 0, 0, 1]));
        let b = expect_completed(reassembler.ingest(&[1, 0, 0, 0, 2]));
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);

        let stats = reassembler.stats();
        assert_eq!(stats.transfers_started, 2);
        assert_eq!(stats.transfers_completed, 2);
        assert_eq!(stats.bytes_received, 2);
    }

    proptest! {
        #[test]
        fn prop_chunking_invariance(
            payload in proptest::collection::vec(any::<u8>(), 1..2048),
            sizes in proptest::collection::vec(1usize..300, 1..64),
        ) {
            let mut stream = (payload.len() as u32).to_le_bytes().to_vec();
            stream.extend_from_slice(&payload);

            let mut reassembler = FrameReassembler::default();
            let mut completed = Vec::new();
            let mut offset = 0;
            let mut sizes = sizes.into_iter().cycle();

            while offset < stream.len() {
                let mut size = sizes.next().unwrap_or(1);
                if offset == 0 {
                    size = size.max(HEADER_LEN);
                }
                let end = (offset + size).min(stream.len());
                let result = reassembler.ingest(&stream[offset..end]);
                prop_assert!(result.is_ok());
                prop_assert!(reassembler.received_count() <= reassembler.expected_length());
                if let Ok(Ingest::Completed(done)) = result {
                    completed.push(done);
                }
                offset = end;
            }

            prop_assert_eq!(completed.len(), 1);
            prop_assert_eq!(&completed[0].data[..], &payload[..]);
            prop_assert!(reassembler.is_awaiting_header());
        }
    }
}
