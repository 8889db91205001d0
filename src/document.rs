/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file document.rs
 * @brief Read-only document view and typed field accessors over BSON documents
 */

use bson::{Bson, Document};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::buffer::peek_i32_le;
use crate::error::{DocWireError, Result};

/// Smallest well-formed BSON document: length prefix plus trailing NUL.
pub const MIN_DOCUMENT_SIZE: usize = 5;

/// Decodes one length-prefixed BSON document at the cursor.
pub fn read_document(buffer: &mut Bytes) -> Result<Document> {
    let declared = peek_i32_le(buffer)
        .ok_or_else(|| DocWireError::invalid_message("Missing BSON document length"))?;

    if declared < MIN_DOCUMENT_SIZE as i32 || declared as usize > buffer.len() {
        return Err(DocWireError::invalid_message(format!(
            "Invalid BSON document length: {} (available: {})",
            declared,
            buffer.len()
        )));
    }

    let len = declared as usize;
    let document = Document::from_reader(&buffer[..len])?;
    buffer.advance(len);
    Ok(document)
}

/// Numeric coercion used by command arguments; doubles must be integral.
pub fn bson_as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    }
}

pub fn bson_is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn type_mismatch(key: &str, expected: &str, found: &Bson) -> DocWireError {
    DocWireError::invalid_argument(format!(
        "field '{}' must be {}, found {:?}",
        key,
        expected,
        found.element_type()
    ))
}

/// Document abstraction consumed by the dispatch engine.
pub trait DocumentExt {
    fn has_key(&self, key: &str) -> bool;

    /// Field names in their original wire order.
    fn field_names(&self) -> Vec<&str>;

    fn value(&self, key: &str) -> Option<&Bson>;

    fn write_to(&self, dst: &mut BytesMut) -> Result<()>;

    fn required_str(&self, key: &str) -> Result<&str>;

    fn optional_str(&self, key: &str) -> Result<Option<&str>>;

    fn optional_i64(&self, key: &str) -> Result<Option<i64>>;

    fn optional_i32(&self, key: &str) -> Result<Option<i32>>;

    fn optional_bool(&self, key: &str) -> Result<Option<bool>>;

    fn optional_document(&self, key: &str) -> Result<Option<&Document>>;
}

impl DocumentExt for Document {
    fn has_key(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn field_names(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }

    fn value(&self, key: &str) -> Option<&Bson> {
        self.get(key)
    }

    fn write_to(&self, dst: &mut BytesMut) -> Result<()> {
        let bytes = bson::to_vec(self)?;
        dst.put_slice(&bytes);
        Ok(())
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(Bson::String(s)) => Ok(s.as_str()),
            Some(other) => Err(type_mismatch(key, "a string", other)),
            None => Err(DocWireError::invalid_argument(format!("missing required field '{}'", key))),
        }
    }

    fn optional_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_mismatch(key, "a string", other)),
        }
    }

    fn optional_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(value) => bson_as_i64(value)
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "an integer", value)),
        }
    }

    fn optional_i32(&self, key: &str) -> Result<Option<i32>> {
        match self.optional_i64(key)? {
            None => Ok(None),
            Some(v) => i32::try_from(v).map(Some).map_err(|_| {
                DocWireError::invalid_argument(format!("field '{}' is out of range: {}", key, v))
            }),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::Boolean(b)) => Ok(Some(*b)),
            Some(value) => bson_as_i64(value)
                .map(|v| Some(v != 0))
                .ok_or_else(|| type_mismatch(key, "a boolean", value)),
        }
    }

    fn optional_document(&self, key: &str) -> Result<Option<&Document>> {
        match self.get(key) {
            None | Some(Bson::Null) => Ok(None),
            Some(Bson::Document(d)) => Ok(Some(d)),
            Some(other) => Err(type_mismatch(key, "an object", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_read_document_consumes_exact_length() {
        let original = doc! { "find": "users", "limit": 2 };
        let mut dst = BytesMut::new();
        original.write_to(&mut dst).unwrap();
        dst.put_slice(b"tail");

        let mut buffer = dst.freeze();
        let decoded = read_document(&mut buffer).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(&buffer[..], b"tail");
    }

    #[test]
    fn test_read_document_rejects_truncated_input() {
        let mut dst = BytesMut::new();
        doc! { "a": 1 }.write_to(&mut dst).unwrap();
        let mut buffer = dst.freeze().slice(..6);
        assert!(matches!(read_document(&mut buffer), Err(DocWireError::InvalidMessage(_))));
    }

    #[test]
    fn test_field_names_keep_wire_order() {
        let document = doc! { "zeta": 1, "alpha": 2, "count": "c" };
        assert_eq!(document.field_names(), vec!["zeta", "alpha", "count"]);
    }

    #[test]
    fn test_typed_accessors() {
        let document = doc! {
            "count": "orders",
            "limit": 10.0,
            "skip": 3_i64,
            "j": true,
            "fsync": 1,
            "query": { "status": "A" },
            "bad": 1.5,
        };

        assert_eq!(document.required_str("count").unwrap(), "orders");
        assert_eq!(document.optional_i32("limit").unwrap(), Some(10));
        assert_eq!(document.optional_i32("skip").unwrap(), Some(3));
        assert_eq!(document.optional_bool("j").unwrap(), Some(true));
        assert_eq!(document.optional_bool("fsync").unwrap(), Some(true));
        assert!(document.optional_document("query").unwrap().is_some());
        assert_eq!(document.optional_str("hint").unwrap(), None);

        assert!(matches!(document.required_str("limit"), Err(DocWireError::InvalidArgument(_))));
        assert!(matches!(document.required_str("missing"), Err(DocWireError::InvalidArgument(_))));
        assert!(matches!(document.optional_i32("bad"), Err(DocWireError::InvalidArgument(_))));
    }
}
