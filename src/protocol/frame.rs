//! Length-prefix framing

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::HEADER_LEN;
use crate::error::TransferError;

/// Frame a payload as `[len u32 LE][payload]` for a single write
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, TransferError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransferError::PayloadTooLarge { len: payload.len() })?;

    let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
    out.put_u32_le(len);
    out.put_slice(payload);
    Ok(out.freeze())
}

/// Read the length prefix from the start of a chunk.
/// Returns None if the chunk holds fewer than four bytes.
pub fn read_header(chunk: &[u8]) -> Option<u32> {
    let header: [u8; HEADER_LEN] = chunk.get(..HEADER_LEN)?.try_into().ok()?;
    Some(u32::from_le_bytes(header))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let frame = encode_frame(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(&frame[..], &[3, 0, 0, 0, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_encode_empty() {
        let frame = encode_frame(&[]).unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_little_endian() {
        assert_eq!(read_header(&[0x10, 0x27, 0x00, 0x00]), Some(10_000));
        assert_eq!(read_header(&[0x01, 0x02, 0x03, 0x04, 0xFF]), Some(0x0403_0201));
    }

    #[test]
    fn test_header_too_short() {
        assert_eq!(read_header(&[]), None);
        assert_eq!(read_header(&[1, 0, 0]), None);
    }
}
