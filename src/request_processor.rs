/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file request_processor.rs
 * @brief Dispatch engine: command path, query path and error routing
 */

use std::sync::Arc;

use tracing::debug;

use crate::commands::{CommandDefinition, CommandRegistry};
use crate::error::{DocWireError, Result};
use crate::processor::{MetaQueryProcessor, ProcessorCaller, QueryCommandProcessor};
use crate::query_message::{QueryFlag, QueryMessage};
use crate::reply::ReplyChannel;
use crate::request::{extract_query, QueryRequest, QueryRequestBuilder};
use crate::wire_protocol::{OpCode, RequestMessage};

pub const ADMIN_DATABASE: &str = "admin";

/// Per-connection request state. Reset at the start of every query
/// message and read back only by `handle_error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestContext {
    active_command: Option<&'static CommandDefinition>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.active_command = None;
    }

    pub fn set_active_command(&mut self, command: &'static CommandDefinition) {
        self.active_command = Some(command);
    }

    pub fn active_command(&self) -> Option<&'static CommandDefinition> {
        self.active_command
    }
}

/// Shared by all connections; holds no per-request state of its own.
#[derive(Clone)]
pub struct RequestProcessor {
    registry: Arc<CommandRegistry>,
    processor: Arc<dyn QueryCommandProcessor>,
    meta: Arc<dyn MetaQueryProcessor>,
}

impl RequestProcessor {
    pub fn new(
        registry: Arc<CommandRegistry>,
        processor: Arc<dyn QueryCommandProcessor>,
        meta: Arc<dyn MetaQueryProcessor>,
    ) -> Self {
        Self {
            registry,
            processor,
            meta,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub async fn handle_message(
        &self,
        message: &RequestMessage,
        context: &mut RequestContext,
        replier: &mut dyn ReplyChannel,
    ) -> Result<()> {
        match message {
            RequestMessage::Query(query) => self.query_message(query, context, replier).await,
        }
    }

    pub async fn query_message(
        &self,
        message: &QueryMessage,
        context: &mut RequestContext,
        replier: &mut dyn ReplyChannel,
    ) -> Result<()> {
        context.reset();

        if !message.is_command() {
            return self.query(message, replier).await;
        }

        let document = message.document();
        let command = match self.registry.lookup(document) {
            Some(command) => command,
            None => return self.processor.no_such_command(document, replier).await,
        };

        if command.is_admin_only() && message.database() != ADMIN_DATABASE {
            return self.processor.admin_only_command(command, replier).await;
        }

        context.set_active_command(command);

        let mut caller = ProcessorCaller::new(
            message.database(),
            self.processor.as_ref(),
            self.meta.as_ref(),
            replier,
        );
        command.call(message.header(), document, &mut caller).await
    }

    /// Plain collection query, served by the meta router when it claims
    /// the message.
    pub async fn query(&self, message: &QueryMessage, replier: &mut dyn ReplyChannel) -> Result<()> {
        let request = build_query_request(message);
        debug!(
            database = %request.database,
            collection = %request.collection,
            skip = request.number_to_skip,
            limit = request.limit,
            "query"
        );

        let reply = if self.meta.is_meta_query(message) {
            self.meta.query(request).await?
        } else {
            self.processor.query(request).await?
        };
        reply.reply(replier).await
    }

    /// Returns `Ok(false)` when no command claims the failure; the caller
    /// then applies its own default reply.
    pub async fn handle_error(
        &self,
        op_code: OpCode,
        context: &RequestContext,
        replier: &mut dyn ReplyChannel,
        error: &DocWireError,
    ) -> Result<bool> {
        if op_code != OpCode::Query {
            return Ok(false);
        }

        match context.active_command() {
            Some(command) => {
                self.processor.command_error(command, replier, error).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub fn build_query_request(message: &QueryMessage) -> QueryRequest {
    QueryRequestBuilder::new(message.database())
        .collection(message.collection())
        .query(extract_query(message.document()))
        .projection(None)
        .number_to_skip(message.number_to_skip())
        .limit(message.number_to_return())
        .await_data(message.is_flag_set(QueryFlag::AwaitData))
        .exhaust(message.is_flag_set(QueryFlag::Exhaust))
        .no_cursor_timeout(message.is_flag_set(QueryFlag::NoCursorTimeout))
        .oplog_replay(message.is_flag_set(QueryFlag::OplogReplay))
        .partial(message.is_flag_set(QueryFlag::Partial))
        .slave_ok(message.is_flag_set(QueryFlag::SlaveOk))
        .tailable(message.is_flag_set(QueryFlag::TailableCursor))
        .build()
}
