/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file lib.rs
 * @brief DocWire library entry point
 *
 * Server side of the MongoDB wire protocol: frame decoding, OP_QUERY
 * parsing, command classification and dispatch, query normalization.
 */

pub mod buffer;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod logger;
pub mod memory_backend;
pub mod processor;
pub mod query_message;
pub mod reply;
pub mod request;
pub mod request_processor;
pub mod server;
pub mod wire_protocol;

pub use commands::{CommandBehavior, CommandDefinition, CommandGroup, CommandRegistry};
pub use config::Config;
pub use document::DocumentExt;
pub use error::{DocWireError, Result};
pub use logger::{init_logger, init_tracing_logger, ConnectionTracker, DocWireLogger, LogLevel};
pub use memory_backend::InMemoryBackend;
pub use processor::{MetaQueryProcessor, NullMetaQueryProcessor, ProcessorCaller, QueryCommandProcessor};
pub use query_message::{QueryFlag, QueryFlags, QueryMessage};
pub use reply::{CollStatsReply, CountReply, QueryReply, ReplyBuffer, ReplyChannel, ReplyFlag, ReplyMessage};
pub use request::{CollStatsRequest, CountRequest, GetLogType, QueryRequest, QueryRequestBuilder, WriteConcern};
pub use request_processor::{RequestContext, RequestProcessor, ADMIN_DATABASE};
pub use server::DocWireServer;
pub use wire_protocol::{IncomingFrame, MessageHeader, OpCode, OutgoingReply, RequestMessage, WireCodec};
