/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file query_message.rs
 * @brief OP_QUERY message model and body decoder
 */

use bson::Document;
use bytes::{BufMut, Bytes, BytesMut};
use crate::buffer::{put_cstring, read_cstring, read_i32_le};
use crate::document::{read_document, DocumentExt};
use crate::error::{DocWireError, Result};
use crate::wire_protocol::MessageHeader;

/// Virtual collection through which clients submit commands.
pub const COMMAND_COLLECTION: &str = "$cmd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFlag {
    TailableCursor,
    SlaveOk,
    OplogReplay,
    NoCursorTimeout,
    AwaitData,
    Exhaust,
    Partial,
}

impl QueryFlag {
    pub const ALL: [QueryFlag; 7] = [
        QueryFlag::TailableCursor,
        QueryFlag::SlaveOk,
        QueryFlag::OplogReplay,
        QueryFlag::NoCursorTimeout,
        QueryFlag::AwaitData,
        QueryFlag::Exhaust,
        QueryFlag::Partial,
    ];

    // Bit 0 is reserved by the wire protocol.
    pub fn mask(self) -> i32 {
        match self {
            QueryFlag::TailableCursor => 1 << 1,
            QueryFlag::SlaveOk => 1 << 2,
            QueryFlag::OplogReplay => 1 << 3,
            QueryFlag::NoCursorTimeout => 1 << 4,
            QueryFlag::AwaitData => 1 << 5,
            QueryFlag::Exhaust => 1 << 6,
            QueryFlag::Partial => 1 << 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags(i32);

impl QueryFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> i32 {
        self.0
    }

    pub fn is_set(&self, flag: QueryFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    pub fn with(self, flag: QueryFlag) -> Self {
        Self(self.0 | flag.mask())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryMessage {
    header: MessageHeader,
    flags: QueryFlags,
    full_collection_name: String,
    database: String,
    collection: String,
    number_to_skip: u32,
    number_to_return: i32,
    document: Document,
    return_fields_selector: Option<Document>,
}

impl QueryMessage {
    pub fn new(
        header: MessageHeader,
        flags: QueryFlags,
        full_collection_name: impl Into<String>,
        number_to_skip: u32,
        number_to_return: i32,
        document: Document,
        return_fields_selector: Option<Document>,
    ) -> Result<Self> {
        let full_collection_name = full_collection_name.into();
        let (database, collection) = split_namespace(&full_collection_name)?;
        // numberToSkip travels as a non-negative int32
        if i32::try_from(number_to_skip).is_err() {
            return Err(DocWireError::invalid_message(format!(
                "OP_QUERY numberToSkip out of range: {}",
                number_to_skip
            )));
        }

        Ok(Self {
            header,
            flags,
            database: database.to_string(),
            collection: collection.to_string(),
            full_collection_name,
            number_to_skip,
            number_to_return,
            document,
            return_fields_selector,
        })
    }

    /// Decodes the OP_QUERY body that follows an already-read header.
    pub fn decode(mut body: Bytes, header: MessageHeader) -> Result<Self> {
        let flags = QueryFlags::from_bits(read_i32_le(&mut body)?);
        let full_collection_name = read_cstring(&mut body)?
            .ok_or_else(|| DocWireError::invalid_message("OP_QUERY collection name is not null-terminated"))?;

        let number_to_skip = read_i32_le(&mut body)?;
        let number_to_skip = u32::try_from(number_to_skip).map_err(|_| {
            DocWireError::invalid_message(format!("OP_QUERY numberToSkip must not be negative: {}", number_to_skip))
        })?;
        let number_to_return = read_i32_le(&mut body)?;

        let document = read_document(&mut body)?;
        let return_fields_selector = if body.is_empty() {
            None
        } else {
            Some(read_document(&mut body)?)
        };

        Self::new(
            header,
            flags,
            full_collection_name,
            number_to_skip,
            number_to_return,
            document,
            return_fields_selector,
        )
    }

    /// Writes the body in the same layout `decode` reads.
    pub fn encode_body(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_i32_le(self.flags.bits());
        put_cstring(dst, &self.full_collection_name);
        dst.put_i32_le(self.number_to_skip as i32);
        dst.put_i32_le(self.number_to_return);
        self.document.write_to(dst)?;
        if let Some(selector) = &self.return_fields_selector {
            selector.write_to(dst)?;
        }
        Ok(())
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn flags(&self) -> QueryFlags {
        self.flags
    }

    pub fn is_flag_set(&self, flag: QueryFlag) -> bool {
        self.flags.is_set(flag)
    }

    pub fn full_collection_name(&self) -> &str {
        &self.full_collection_name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_command(&self) -> bool {
        self.collection == COMMAND_COLLECTION
    }

    pub fn number_to_skip(&self) -> u32 {
        self.number_to_skip
    }

    pub fn number_to_return(&self) -> i32 {
        self.number_to_return
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn return_fields_selector(&self) -> Option<&Document> {
        self.return_fields_selector.as_ref()
    }
}

/// Splits `database.collection` on the first separator.
pub fn split_namespace(full_collection_name: &str) -> Result<(&str, &str)> {
    match full_collection_name.split_once('.') {
        Some((database, collection)) if !database.is_empty() && !collection.is_empty() => {
            Ok((database, collection))
        }
        _ => Err(DocWireError::invalid_message(format!(
            "Invalid namespace: '{}'",
            full_collection_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn header() -> MessageHeader {
        MessageHeader::new(7, crate::wire_protocol::OpCode::Query)
    }

    #[test]
    fn test_split_namespace_on_first_dot() {
        assert_eq!(split_namespace("test.system.indexes").unwrap(), ("test", "system.indexes"));
        assert_eq!(split_namespace("admin.$cmd").unwrap(), ("admin", "$cmd"));
        assert!(split_namespace("nodot").is_err());
        assert!(split_namespace(".coll").is_err());
    }

    #[test]
    fn test_flags_are_individually_testable() {
        let flags = QueryFlags::default()
            .with(QueryFlag::SlaveOk)
            .with(QueryFlag::Exhaust);
        assert_eq!(flags.bits(), (1 << 2) | (1 << 6));
        assert!(flags.is_set(QueryFlag::SlaveOk));
        assert!(flags.is_set(QueryFlag::Exhaust));
        assert!(!flags.is_set(QueryFlag::TailableCursor));
    }

    #[test]
    fn test_decode_without_selector() {
        let message = QueryMessage::new(
            header(),
            QueryFlags::default().with(QueryFlag::AwaitData),
            "shop.orders",
            4,
            -3,
            doc! { "status": "A" },
            None,
        )
        .unwrap();

        let mut body = BytesMut::new();
        message.encode_body(&mut body).unwrap();
        let decoded = QueryMessage::decode(body.freeze(), header()).unwrap();

        assert_eq!(decoded, message);
        assert!(decoded.return_fields_selector().is_none());
        assert_eq!(decoded.database(), "shop");
        assert_eq!(decoded.collection(), "orders");
        assert!(!decoded.is_command());
    }

    #[test]
    fn test_decode_rejects_negative_skip() {
        let mut body = BytesMut::new();
        body.put_i32_le(0);
        put_cstring(&mut body, "test.c");
        body.put_i32_le(-1);
        body.put_i32_le(0);
        doc! {}.write_to(&mut body).unwrap();

        let err = QueryMessage::decode(body.freeze(), header()).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
    }

    #[test]
    fn test_new_rejects_skip_beyond_int32() {
        let err = QueryMessage::new(header(), QueryFlags::default(), "test.c", u32::MAX, 0, doc! {}, None)
            .unwrap_err();
        assert!(matches!(err, DocWireError::InvalidMessage(_)));

        let widest = QueryMessage::new(header(), QueryFlags::default(), "test.c", i32::MAX as u32, 0, doc! {}, None)
            .unwrap();
        let mut body = BytesMut::new();
        widest.encode_body(&mut body).unwrap();
        assert_eq!(QueryMessage::decode(body.freeze(), header()).unwrap(), widest);
    }

    #[test]
    fn test_decode_rejects_unterminated_namespace() {
        let mut body = BytesMut::new();
        body.put_i32_le(0);
        body.put_slice(b"test.c");
        let err = QueryMessage::decode(body.freeze(), header()).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
    }
}
