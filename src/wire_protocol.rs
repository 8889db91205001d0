/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file wire_protocol.rs
 * @brief MongoDB wire protocol framing, opcode routing and reply encoding
 */

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace, warn};

use crate::buffer::{peek_i32_le, read_i32_le, skip_bytes};
use crate::error::{DocWireError, Result};
use crate::query_message::QueryMessage;
use crate::reply::ReplyMessage;

/// messageLength + requestID + responseTo + opCode
pub const HEADER_SIZE: usize = 16;

pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 48_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Reply,
    MsgLegacy,
    Update,
    Insert,
    Reserved,
    Query,
    GetMore,
    Delete,
    KillCursors,
}

impl OpCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(OpCode::Reply),
            1000 => Some(OpCode::MsgLegacy),
            2001 => Some(OpCode::Update),
            2002 => Some(OpCode::Insert),
            2003 => Some(OpCode::Reserved),
            2004 => Some(OpCode::Query),
            2005 => Some(OpCode::GetMore),
            2006 => Some(OpCode::Delete),
            2007 => Some(OpCode::KillCursors),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            OpCode::Reply => 1,
            OpCode::MsgLegacy => 1000,
            OpCode::Update => 2001,
            OpCode::Insert => 2002,
            OpCode::Reserved => 2003,
            OpCode::Query => 2004,
            OpCode::GetMore => 2005,
            OpCode::Delete => 2006,
            OpCode::KillCursors => 2007,
        }
    }

    /// Opcodes a client may send.
    pub fn is_request(self) -> bool {
        !matches!(self, OpCode::Reply)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_i32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub request_id: i32,
    pub op_code: OpCode,
}

impl MessageHeader {
    pub fn new(request_id: i32, op_code: OpCode) -> Self {
        Self { request_id, op_code }
    }
}

/// A fully decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMessage {
    Query(QueryMessage),
}

impl RequestMessage {
    pub fn header(&self) -> &MessageHeader {
        match self {
            RequestMessage::Query(message) => message.header(),
        }
    }

    pub fn op_code(&self) -> OpCode {
        self.header().op_code
    }
}

/// One complete frame taken off the stream. A frame whose body could not
/// be decoded is still delimited, so the connection can answer it and go on.
#[derive(Debug)]
pub enum IncomingFrame {
    Request(RequestMessage),
    Rejected { request_id: i32, error: DocWireError },
}

impl IncomingFrame {
    pub fn request_id(&self) -> i32 {
        match self {
            IncomingFrame::Request(message) => message.header().request_id,
            IncomingFrame::Rejected { request_id, .. } => *request_id,
        }
    }
}

pub type BodyDecoder = fn(Bytes, MessageHeader) -> Result<RequestMessage>;

/// Body decoder registered for an opcode, if any.
pub fn body_decoder(op_code: OpCode) -> Option<BodyDecoder> {
    match op_code {
        OpCode::Query => Some(decode_query_body as BodyDecoder),
        _ => None,
    }
}

fn decode_query_body(body: Bytes, header: MessageHeader) -> Result<RequestMessage> {
    QueryMessage::decode(body, header).map(RequestMessage::Query)
}

/// Decodes one complete frame (length prefix included).
pub fn decode_frame(mut frame: Bytes) -> Result<RequestMessage> {
    skip_bytes(&mut frame, 4)?;
    let request_id = read_i32_le(&mut frame)?;
    // responseTo carries nothing meaningful on client requests
    skip_bytes(&mut frame, 4)?;
    let raw_op_code = read_i32_le(&mut frame)?;

    let op_code = match OpCode::from_i32(raw_op_code).filter(|op| op.is_request()) {
        Some(op_code) => op_code,
        None => {
            warn!("Received an invalid message with opCode {}", raw_op_code);
            return Err(DocWireError::invalid_message(format!(
                "Received an invalid message with opCode {}",
                raw_op_code
            )));
        }
    };

    let decoder = match body_decoder(op_code) {
        Some(decoder) => decoder,
        None => {
            error!("Message decoder not implemented for opCode {}", op_code);
            return Err(DocWireError::UnimplementedOperation(op_code.to_string()));
        }
    };

    trace!(request_id, %op_code, body_len = frame.len(), "decoding message body");
    decoder(frame, MessageHeader::new(request_id, op_code))
}

/// Wraps a query message into a complete request frame.
pub fn encode_query_frame(message: &QueryMessage, dst: &mut BytesMut) -> Result<()> {
    let mut body = BytesMut::new();
    message.encode_body(&mut body)?;
    put_header(dst, HEADER_SIZE + body.len(), message.header().request_id, 0, OpCode::Query)?;
    dst.put_slice(&body);
    Ok(())
}

pub(crate) fn put_header(
    dst: &mut BytesMut,
    message_length: usize,
    request_id: i32,
    response_to: i32,
    op_code: OpCode,
) -> Result<()> {
    let message_length = i32::try_from(message_length)
        .map_err(|_| DocWireError::invalid_message(format!("Message too large: {} bytes", message_length)))?;
    dst.reserve(HEADER_SIZE);
    dst.put_i32_le(message_length);
    dst.put_i32_le(request_id);
    dst.put_i32_le(response_to);
    dst.put_i32_le(op_code.as_i32());
    Ok(())
}

/// A reply addressed to the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReply {
    pub response_to: i32,
    pub reply: ReplyMessage,
}

/// Per-connection framing codec: requests in, OP_REPLY out.
#[derive(Debug)]
pub struct WireCodec {
    max_message_size: usize,
    next_request_id: i32,
}

impl WireCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            next_request_id: 1,
        }
    }

    fn allocate_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Decoder for WireCodec {
    type Item = IncomingFrame;
    type Error = DocWireError;

    /// Only a bad `messageLength` is an error here: past that point the
    /// stream is no longer aligned on frame boundaries.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<IncomingFrame>> {
        // Teardown can hand us an empty buffer; that is not a frame.
        if src.is_empty() {
            return Ok(None);
        }

        let declared = match peek_i32_le(src) {
            Some(declared) => declared,
            None => return Ok(None),
        };

        if declared < HEADER_SIZE as i32 || declared as usize > self.max_message_size {
            warn!("Rejecting frame with messageLength {}", declared);
            return Err(DocWireError::invalid_message(format!(
                "Invalid messageLength {} (max {})",
                declared, self.max_message_size
            )));
        }

        let len = declared as usize;
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(len).freeze();
        let request_id = peek_i32_le(&frame[4..]).unwrap_or_default();
        match decode_frame(frame) {
            Ok(message) => Ok(Some(IncomingFrame::Request(message))),
            Err(error) => Ok(Some(IncomingFrame::Rejected { request_id, error })),
        }
    }
}

impl Encoder<OutgoingReply> for WireCodec {
    type Error = DocWireError;

    fn encode(&mut self, item: OutgoingReply, dst: &mut BytesMut) -> Result<()> {
        let request_id = self.allocate_request_id();
        item.reply.encode(request_id, item.response_to, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentExt;
    use crate::query_message::QueryFlags;
    use bson::doc;

    fn query_frame(request_id: i32) -> BytesMut {
        let message = QueryMessage::new(
            MessageHeader::new(request_id, OpCode::Query),
            QueryFlags::default(),
            "admin.$cmd",
            0,
            -1,
            doc! { "isMaster": 1 },
            None,
        )
        .unwrap();
        let mut dst = BytesMut::new();
        encode_query_frame(&message, &mut dst).unwrap();
        dst
    }

    fn decode_request(codec: &mut WireCodec, src: &mut BytesMut) -> RequestMessage {
        match codec.decode(src).unwrap().unwrap() {
            IncomingFrame::Request(message) => message,
            IncomingFrame::Rejected { error, .. } => panic!("frame rejected: {}", error),
        }
    }

    fn decode_rejection(codec: &mut WireCodec, src: &mut BytesMut) -> (i32, DocWireError) {
        match codec.decode(src).unwrap().unwrap() {
            IncomingFrame::Rejected { request_id, error } => (request_id, error),
            IncomingFrame::Request(message) => panic!("frame accepted: {:?}", message),
        }
    }

    fn raw_frame(op_code: i32) -> BytesMut {
        let mut dst = BytesMut::new();
        dst.put_i32_le(HEADER_SIZE as i32 + 4);
        dst.put_i32_le(9);
        dst.put_i32_le(0);
        dst.put_i32_le(op_code);
        dst.put_i32_le(0);
        dst
    }

    #[test]
    fn test_opcode_registry() {
        assert_eq!(OpCode::from_i32(2004), Some(OpCode::Query));
        assert_eq!(OpCode::from_i32(2007), Some(OpCode::KillCursors));
        assert_eq!(OpCode::from_i32(9999), None);
        assert_eq!(OpCode::Query.as_i32(), 2004);
        assert!(!OpCode::Reply.is_request());
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let mut codec = WireCodec::default();
        let mut src = BytesMut::new();
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut codec = WireCodec::default();
        let full = query_frame(3);
        let mut src = BytesMut::from(&full[..10]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(&full[10..]);
        let message = decode_request(&mut codec, &mut src);
        assert_eq!(message.header().request_id, 3);
        assert_eq!(message.op_code(), OpCode::Query);
        assert!(src.is_empty());
    }

    #[test]
    fn test_back_to_back_frames_decode_in_order() {
        let mut codec = WireCodec::default();
        let mut src = query_frame(1);
        src.extend_from_slice(&query_frame(2));

        let first = decode_request(&mut codec, &mut src);
        let second = decode_request(&mut codec, &mut src);
        assert_eq!(first.header().request_id, 1);
        assert_eq!(second.header().request_id, 2);
    }

    #[test]
    fn test_unknown_opcode_is_invalid_message() {
        let mut codec = WireCodec::default();
        let mut src = raw_frame(4242);
        let (request_id, err) = decode_rejection(&mut codec, &mut src);
        assert_eq!(request_id, 9);
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
        assert!(src.is_empty());
    }

    #[test]
    fn test_reply_opcode_from_client_is_invalid_message() {
        let mut codec = WireCodec::default();
        let mut src = raw_frame(1);
        let (_, err) = decode_rejection(&mut codec, &mut src);
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
    }

    #[test]
    fn test_known_opcode_without_decoder_is_unimplemented() {
        let mut codec = WireCodec::default();
        let mut src = raw_frame(2005);
        let (_, err) = decode_rejection(&mut codec, &mut src);
        assert!(matches!(err, DocWireError::UnimplementedOperation(_)));
    }

    #[test]
    fn test_rejected_frame_does_not_disturb_the_next_one() {
        let mut codec = WireCodec::default();
        let mut src = raw_frame(2002);
        src.extend_from_slice(&query_frame(10));

        let (request_id, err) = decode_rejection(&mut codec, &mut src);
        assert_eq!(request_id, 9);
        assert!(matches!(err, DocWireError::UnimplementedOperation(_)));

        let next = decode_request(&mut codec, &mut src);
        assert_eq!(next.header().request_id, 10);
        assert!(src.is_empty());
    }

    #[test]
    fn test_malformed_query_body_is_rejected_with_its_request_id() {
        let mut src = BytesMut::new();
        let mut body = BytesMut::new();
        body.put_i32_le(0);
        crate::buffer::put_cstring(&mut body, "nodot");
        body.put_i32_le(0);
        body.put_i32_le(0);
        doc! {}.write_to(&mut body).unwrap();
        put_header(&mut src, HEADER_SIZE + body.len(), 33, 0, OpCode::Query).unwrap();
        src.put_slice(&body);

        let mut codec = WireCodec::default();
        let (request_id, err) = decode_rejection(&mut codec, &mut src);
        assert_eq!(request_id, 33);
        assert!(matches!(err, DocWireError::InvalidMessage(_)));
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        let mut codec = WireCodec::new(64);
        let mut src = BytesMut::new();
        src.put_i32_le(65);
        assert!(matches!(codec.decode(&mut src), Err(DocWireError::InvalidMessage(_))));
    }
}
