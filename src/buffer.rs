/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file buffer.rs
 * @brief Little-endian cursor reads over wire buffers
 */

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::error::{DocWireError, Result};

pub const CSTRING_BYTE_TERMINATION: u8 = b'\0';

fn ensure_remaining(buffer: &Bytes, needed: usize, what: &str) -> Result<()> {
    if buffer.remaining() < needed {
        return Err(DocWireError::invalid_message(format!(
            "Not enough bytes to read {}: needed {}, {} remaining",
            what,
            needed,
            buffer.remaining()
        )));
    }
    Ok(())
}

/// Reads a C-string and advances past its terminator.
///
/// Returns `Ok(None)` without touching the cursor when no terminator is
/// present, so callers can treat the field as absent.
pub fn read_cstring(buffer: &mut Bytes) -> Result<Option<String>> {
    let pos = match buffer.iter().position(|b| *b == CSTRING_BYTE_TERMINATION) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let text = std::str::from_utf8(&buffer[..pos])
        .map_err(|e| DocWireError::invalid_message(format!("C-string is not valid UTF-8: {}", e)))?
        .to_string();
    buffer.advance(pos + 1);

    Ok(Some(text))
}

pub fn read_i32_le(buffer: &mut Bytes) -> Result<i32> {
    ensure_remaining(buffer, 4, "int32")?;
    Ok(buffer.get_i32_le())
}

pub fn read_i64_le(buffer: &mut Bytes) -> Result<i64> {
    ensure_remaining(buffer, 8, "int64")?;
    Ok(buffer.get_i64_le())
}

/// Peeks the int32 at the cursor without consuming it.
pub fn peek_i32_le(buffer: &[u8]) -> Option<i32> {
    if buffer.len() < 4 {
        return None;
    }
    Some(i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]))
}

pub fn read_bytes(buffer: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure_remaining(buffer, len, "byte span")?;
    Ok(buffer.split_to(len))
}

pub fn skip_bytes(buffer: &mut Bytes, len: usize) -> Result<()> {
    ensure_remaining(buffer, len, "skipped field")?;
    buffer.advance(len);
    Ok(())
}

pub fn put_cstring(dst: &mut BytesMut, value: &str) {
    dst.put_slice(value.as_bytes());
    dst.put_u8(CSTRING_BYTE_TERMINATION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cstring_without_terminator() {
        let mut buffer = Bytes::from_static(b"admin.$cmd");
        assert_eq!(read_cstring(&mut buffer).unwrap(), None);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_read_cstring_stops_after_terminator() {
        let mut buffer = Bytes::from_static(b"test.users\0\x05\x00");
        let text = read_cstring(&mut buffer).unwrap();
        assert_eq!(text.as_deref(), Some("test.users"));
        assert_eq!(&buffer[..], b"\x05\x00");
    }

    #[test]
    fn test_read_cstring_empty_string() {
        let mut buffer = Bytes::from_static(b"\0rest");
        assert_eq!(read_cstring(&mut buffer).unwrap().as_deref(), Some(""));
        assert_eq!(&buffer[..], b"rest");
    }

    #[test]
    fn test_read_cstring_invalid_utf8_keeps_cursor() {
        let mut buffer = Bytes::from_static(b"\xff\xfe\0");
        assert!(read_cstring(&mut buffer).is_err());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_fixed_width_reads_are_little_endian() {
        let mut buffer = Bytes::from_static(&[0x01, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(read_i32_le(&mut buffer).unwrap(), 1);
        assert_eq!(read_i32_le(&mut buffer).unwrap(), -1);
        assert!(read_i32_le(&mut buffer).is_err());
    }

    #[test]
    fn test_short_read_is_invalid_message() {
        let mut buffer = Bytes::from_static(&[0x01, 0x02]);
        let err = read_i64_le(&mut buffer).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_put_cstring_appends_terminator() {
        let mut dst = BytesMut::new();
        put_cstring(&mut dst, "db.coll");
        assert_eq!(&dst[..], b"db.coll\0");
    }
}
