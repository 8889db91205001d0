/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file reply.rs
 * @brief OP_REPLY payloads and the reply channel abstraction
 */

use std::net::SocketAddr;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::{read_i32_le, read_i64_le, skip_bytes};
use crate::document::{read_document, DocumentExt, MIN_DOCUMENT_SIZE};
use crate::error::{DocWireError, Result};
use crate::wire_protocol::{put_header, OpCode, HEADER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFlag {
    CursorNotFound,
    QueryFailure,
    ShardConfigStale,
    AwaitCapable,
}

impl ReplyFlag {
    pub fn mask(self) -> i32 {
        match self {
            ReplyFlag::CursorNotFound => 1,
            ReplyFlag::QueryFailure => 1 << 1,
            ReplyFlag::ShardConfigStale => 1 << 2,
            ReplyFlag::AwaitCapable => 1 << 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplyMessage {
    pub flags: i32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl ReplyMessage {
    /// Single-document reply, the shape every command answers with.
    pub fn single(document: Document) -> Self {
        Self {
            documents: vec![document],
            ..Self::default()
        }
    }

    /// Generic failure reply for errors no command handler claimed.
    pub fn query_failure(error: &DocWireError) -> Self {
        Self {
            flags: ReplyFlag::QueryFailure.mask(),
            documents: vec![doc! { "$err": error.to_string(), "code": error.code() }],
            ..Self::default()
        }
    }

    /// Command-level error document (`ok: 0`).
    pub fn command_error(error: &DocWireError) -> Self {
        Self::single(doc! {
            "ok": 0.0,
            "errmsg": error.to_string(),
            "code": error.code(),
        })
    }

    pub fn is_flag_set(&self, flag: ReplyFlag) -> bool {
        self.flags & flag.mask() != 0
    }

    pub fn first_document(&self) -> Option<&Document> {
        self.documents.first()
    }

    pub fn encode(&self, request_id: i32, response_to: i32, dst: &mut BytesMut) -> Result<()> {
        let mut body = BytesMut::new();
        body.put_i32_le(self.flags);
        body.put_i64_le(self.cursor_id);
        body.put_i32_le(self.starting_from);
        body.put_i32_le(self.documents.len() as i32);
        for document in &self.documents {
            document.write_to(&mut body)?;
        }

        put_header(dst, HEADER_SIZE + body.len(), request_id, response_to, OpCode::Reply)?;
        dst.put_slice(&body);
        Ok(())
    }

    /// Decodes a complete OP_REPLY frame; returns the responseTo id with it.
    pub fn decode_frame(mut frame: Bytes) -> Result<(i32, ReplyMessage)> {
        skip_bytes(&mut frame, 8)?;
        let response_to = read_i32_le(&mut frame)?;
        let op_code = read_i32_le(&mut frame)?;
        if op_code != OpCode::Reply.as_i32() {
            return Err(DocWireError::invalid_message(format!("Expected OP_REPLY, got opCode {}", op_code)));
        }

        let flags = read_i32_le(&mut frame)?;
        let cursor_id = read_i64_le(&mut frame)?;
        let starting_from = read_i32_le(&mut frame)?;
        let number_returned = read_i32_le(&mut frame)?;

        let capacity = (number_returned.max(0) as usize).min(frame.len() / MIN_DOCUMENT_SIZE);
        let mut documents = Vec::with_capacity(capacity);
        for _ in 0..number_returned {
            documents.push(read_document(&mut frame)?);
        }

        Ok((
            response_to,
            ReplyMessage {
                flags,
                cursor_id,
                starting_from,
                documents,
            },
        ))
    }

    pub async fn reply(self, channel: &mut dyn ReplyChannel) -> Result<()> {
        channel.send_reply(self).await
    }
}

/// Connection-side sink for replies.
#[async_trait]
pub trait ReplyChannel: Send {
    async fn send_reply(&mut self, reply: ReplyMessage) -> Result<()>;

    fn peer_address(&self) -> Option<SocketAddr> {
        None
    }
}

/// Collects replies for one request; the connection loop flushes them.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    peer: Option<SocketAddr>,
    pending: Vec<ReplyMessage>,
}

impl ReplyBuffer {
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            pending: Vec::new(),
        }
    }

    pub fn replies(&self) -> &[ReplyMessage] {
        &self.pending
    }

    pub fn take(&mut self) -> Vec<ReplyMessage> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[async_trait]
impl ReplyChannel for ReplyBuffer {
    async fn send_reply(&mut self, reply: ReplyMessage) -> Result<()> {
        self.pending.push(reply);
        Ok(())
    }

    fn peer_address(&self) -> Option<SocketAddr> {
        self.peer
    }
}

/// Result batch of a plain query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryReply {
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl QueryReply {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub async fn reply(self, channel: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::from(self).reply(channel).await
    }
}

impl From<QueryReply> for ReplyMessage {
    fn from(reply: QueryReply) -> Self {
        ReplyMessage {
            flags: 0,
            cursor_id: reply.cursor_id,
            starting_from: reply.starting_from,
            documents: reply.documents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReply {
    pub count: i64,
}

impl CountReply {
    pub async fn reply(self, channel: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::from(self).reply(channel).await
    }
}

impl From<CountReply> for ReplyMessage {
    fn from(reply: CountReply) -> Self {
        ReplyMessage::single(doc! { "n": reply.count as f64, "ok": 1.0 })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollStatsReply {
    pub namespace: String,
    pub count: i64,
    pub size: i64,
    pub storage_size: i64,
    pub total_index_size: i64,
    pub index_sizes: Document,
    pub scale: i64,
    pub capped: bool,
}

impl CollStatsReply {
    pub async fn reply(self, channel: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::from(self).reply(channel).await
    }
}

impl From<CollStatsReply> for ReplyMessage {
    fn from(reply: CollStatsReply) -> Self {
        let scale = reply.scale.max(1);
        let avg_obj_size = if reply.count > 0 { reply.size / reply.count } else { 0 };
        let index_sizes: Document = reply
            .index_sizes
            .into_iter()
            .map(|(name, size)| match size {
                Bson::Int64(bytes) => (name, Bson::Int64(bytes / scale)),
                other => (name, other),
            })
            .collect();

        ReplyMessage::single(doc! {
            "ns": reply.namespace,
            "count": reply.count,
            "size": reply.size / scale,
            "avgObjSize": avg_obj_size,
            "storageSize": reply.storage_size / scale,
            "nindexes": index_sizes.len() as i32,
            "totalIndexSize": reply.total_index_size / scale,
            "indexSizes": index_sizes,
            "capped": reply.capped,
            "scaleFactor": scale,
            "ok": 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_frame_layout() {
        let reply = ReplyMessage::single(doc! { "ok": 1.0 });
        let mut dst = BytesMut::new();
        reply.encode(5, 42, &mut dst).unwrap();

        let declared = i32::from_le_bytes([dst[0], dst[1], dst[2], dst[3]]);
        assert_eq!(declared as usize, dst.len());
        assert_eq!(i32::from_le_bytes([dst[12], dst[13], dst[14], dst[15]]), 1);

        let (response_to, decoded) = ReplyMessage::decode_frame(dst.freeze()).unwrap();
        assert_eq!(response_to, 42);
        assert_eq!(decoded, reply);
    }

    #[test]
    fn test_inflated_document_count_fails_cleanly() {
        let mut dst = BytesMut::new();
        ReplyMessage::single(doc! { "ok": 1.0 }).encode(5, 42, &mut dst).unwrap();
        // numberReturned sits after header, flags, cursorID and startingFrom
        dst[32..36].copy_from_slice(&i32::MAX.to_le_bytes());

        let err = ReplyMessage::decode_frame(dst.freeze()).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
    }

    #[test]
    fn test_query_failure_sets_flag() {
        let reply = ReplyMessage::query_failure(&DocWireError::Backend("disk full".to_string()));
        assert!(reply.is_flag_set(ReplyFlag::QueryFailure));
        let document = reply.first_document().unwrap();
        assert_eq!(document.get_str("$err").unwrap(), "Backend error: disk full");
        assert_eq!(document.get_i32("code").unwrap(), 1);
    }

    #[test]
    fn test_coll_stats_reply_applies_scale() {
        let reply = CollStatsReply {
            namespace: "test.c".to_string(),
            count: 4,
            size: 4096,
            storage_size: 8192,
            total_index_size: 2048,
            index_sizes: doc! { "_id_": 2048_i64 },
            scale: 1024,
            capped: false,
        };
        let message = ReplyMessage::from(reply);
        let document = message.first_document().unwrap();
        assert_eq!(document.get_i64("size").unwrap(), 4);
        assert_eq!(document.get_i64("avgObjSize").unwrap(), 1024);
        assert_eq!(document.get_document("indexSizes").unwrap().get_i64("_id_").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reply_buffer_collects_in_order() {
        let mut buffer = ReplyBuffer::default();
        CountReply { count: 3 }.reply(&mut buffer).await.unwrap();
        QueryReply::new(vec![doc! { "a": 1 }]).reply(&mut buffer).await.unwrap();

        let replies = buffer.take();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].first_document().unwrap().get_f64("n").unwrap(), 3.0);
        assert_eq!(replies[1].documents.len(), 1);
        assert!(buffer.is_empty());
    }
}
