/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file processor.rs
 * @brief Backend seams and the per-request command invocation context
 */

use std::net::SocketAddr;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use tracing::info;

use crate::commands::CommandDefinition;
use crate::document::{bson_as_i64, DocumentExt};
use crate::error::{DocWireError, Result};
use crate::query_message::QueryMessage;
use crate::reply::{CollStatsReply, CountReply, QueryReply, ReplyChannel, ReplyMessage};
use crate::request::{CollStatsRequest, CountRequest, GetLogType, QueryRequest, WriteConcern};

/// Storage-facing command handlers.
///
/// Handlers that return a typed reply leave sending to the caller; the
/// rest write directly to the reply channel. The defaulted methods carry
/// the standard failure documents clients expect.
#[async_trait]
pub trait QueryCommandProcessor: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryReply>;

    async fn count(&self, request: CountRequest) -> Result<CountReply>;

    async fn coll_stats(&self, request: CollStatsRequest) -> Result<CollStatsReply>;

    async fn insert(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn update(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn delete(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn get_last_error(&self, concern: WriteConcern, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn create_indexes(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn delete_indexes(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn create(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn drop(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn validate(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn whatsmyuri(&self, peer: Option<SocketAddr>, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn is_master(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn repl_set_get_status(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn build_info(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn ping(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn get_log(&self, log: GetLogType, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn list_databases(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn get_nonce(&self, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn list_collections(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()>;

    async fn list_indexes(&self, database: &str, collection: &str, replier: &mut dyn ReplyChannel) -> Result<()>;

    /// Recognized command with no behavior behind it.
    async fn unimplemented(&self, command: &CommandDefinition, replier: &mut dyn ReplyChannel) -> Result<()> {
        let error = DocWireError::UnimplementedCommand(command.key().to_string());
        ReplyMessage::command_error(&error).reply(replier).await
    }

    /// Failure raised while `command` was the active command.
    async fn command_error(
        &self,
        command: &CommandDefinition,
        replier: &mut dyn ReplyChannel,
        error: &DocWireError,
    ) -> Result<()> {
        info!(command = command.key(), "command failed: {}", error);
        ReplyMessage::command_error(error).reply(replier).await
    }

    async fn no_such_command(&self, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let name = document.keys().next().map(String::as_str).unwrap_or_default();
        let error = DocWireError::NoSuchCommand(name.to_string());
        info!("{}", error);

        ReplyMessage::single(doc! {
            "ok": 0.0,
            "errmsg": error.to_string(),
            "code": error.code(),
            "bad cmd": document.clone(),
        })
        .reply(replier)
        .await
    }

    async fn admin_only_command(&self, command: &CommandDefinition, replier: &mut dyn ReplyChannel) -> Result<()> {
        let error = DocWireError::AdminOnly(command.key().to_string());
        info!("{}", error);
        ReplyMessage::command_error(&error).reply(replier).await
    }
}

/// Router for internal or virtual collections served outside the plain backend.
#[async_trait]
pub trait MetaQueryProcessor: Send + Sync {
    fn is_meta_collection(&self, collection: &str) -> bool;

    fn is_meta_query(&self, message: &QueryMessage) -> bool {
        self.is_meta_collection(message.collection())
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryReply>;

    async fn count(&self, request: CountRequest) -> Result<CountReply>;

    async fn coll_stats(&self, request: CollStatsRequest) -> Result<CollStatsReply>;
}

/// Claims no collection; every request goes to the plain backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetaQueryProcessor;

#[async_trait]
impl MetaQueryProcessor for NullMetaQueryProcessor {
    fn is_meta_collection(&self, _collection: &str) -> bool {
        false
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryReply> {
        Err(not_a_meta_collection(&request.collection))
    }

    async fn count(&self, request: CountRequest) -> Result<CountReply> {
        Err(not_a_meta_collection(&request.collection))
    }

    async fn coll_stats(&self, request: CollStatsRequest) -> Result<CollStatsReply> {
        Err(not_a_meta_collection(&request.collection))
    }
}

fn not_a_meta_collection(collection: &str) -> DocWireError {
    DocWireError::Backend(format!("{} is not a meta collection", collection))
}

/// Per-request invocation context handed to command definitions.
pub struct ProcessorCaller<'a> {
    database: &'a str,
    processor: &'a dyn QueryCommandProcessor,
    meta: &'a dyn MetaQueryProcessor,
    replier: &'a mut dyn ReplyChannel,
}

impl<'a> ProcessorCaller<'a> {
    pub fn new(
        database: &'a str,
        processor: &'a dyn QueryCommandProcessor,
        meta: &'a dyn MetaQueryProcessor,
        replier: &'a mut dyn ReplyChannel,
    ) -> Self {
        Self {
            database,
            processor,
            meta,
            replier,
        }
    }

    pub fn database(&self) -> &str {
        self.database
    }

    pub async fn count(&mut self, query: &Document) -> Result<()> {
        let request = count_request(self.database, query)?;
        let reply = if self.meta.is_meta_collection(&request.collection) {
            self.meta.count(request).await?
        } else {
            self.processor.count(request).await?
        };
        reply.reply(self.replier).await
    }

    pub async fn coll_stats(&mut self, query: &Document) -> Result<()> {
        let request = coll_stats_request(self.database, query)?;
        let reply = if self.meta.is_meta_collection(&request.collection) {
            self.meta.coll_stats(request).await?
        } else {
            self.processor.coll_stats(request).await?
        };
        reply.reply(self.replier).await
    }

    pub async fn insert(&mut self, query: &Document) -> Result<()> {
        self.processor.insert(self.database, query, self.replier).await
    }

    pub async fn update(&mut self, query: &Document) -> Result<()> {
        self.processor.update(self.database, query, self.replier).await
    }

    pub async fn delete(&mut self, query: &Document) -> Result<()> {
        self.processor.delete(self.database, query, self.replier).await
    }

    pub async fn get_last_error(&mut self, concern: WriteConcern) -> Result<()> {
        self.processor.get_last_error(concern, self.replier).await
    }

    pub async fn create_indexes(&mut self, query: &Document) -> Result<()> {
        self.processor.create_indexes(self.database, query, self.replier).await
    }

    pub async fn delete_indexes(&mut self, query: &Document) -> Result<()> {
        self.processor.delete_indexes(self.database, query, self.replier).await
    }

    pub async fn create(&mut self, query: &Document) -> Result<()> {
        self.processor.create(self.database, query, self.replier).await
    }

    pub async fn drop(&mut self, query: &Document) -> Result<()> {
        self.processor.drop(self.database, query, self.replier).await
    }

    pub async fn validate(&mut self, query: &Document) -> Result<()> {
        self.processor.validate(self.database, query, self.replier).await
    }

    pub async fn whatsmyuri(&mut self) -> Result<()> {
        let peer = self.replier.peer_address();
        self.processor.whatsmyuri(peer, self.replier).await
    }

    pub async fn is_master(&mut self) -> Result<()> {
        self.processor.is_master(self.replier).await
    }

    pub async fn repl_set_get_status(&mut self) -> Result<()> {
        self.processor.repl_set_get_status(self.replier).await
    }

    pub async fn build_info(&mut self) -> Result<()> {
        self.processor.build_info(self.replier).await
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.processor.ping(self.replier).await
    }

    pub async fn get_log(&mut self, log: GetLogType) -> Result<()> {
        self.processor.get_log(log, self.replier).await
    }

    pub async fn list_databases(&mut self) -> Result<()> {
        self.processor.list_databases(self.replier).await
    }

    pub async fn get_nonce(&mut self) -> Result<()> {
        self.processor.get_nonce(self.replier).await
    }

    pub async fn list_collections(&mut self, query: &Document) -> Result<()> {
        self.processor.list_collections(self.database, query, self.replier).await
    }

    pub async fn list_indexes(&mut self, collection: &str) -> Result<()> {
        self.processor.list_indexes(self.database, collection, self.replier).await
    }

    pub async fn unimplemented(&mut self, command: &CommandDefinition) -> Result<()> {
        self.processor.unimplemented(command, self.replier).await
    }
}

pub fn count_request(database: &str, query: &Document) -> Result<CountRequest> {
    let collection = query.required_str("count")?;

    Ok(CountRequest {
        database: database.to_string(),
        collection: collection.to_string(),
        query: query.optional_document("query")?.cloned(),
        hint: query.optional_str("hint")?.map(str::to_string),
        limit: query.optional_i32("limit")?.unwrap_or(0),
        skip: query.optional_i32("skip")?.unwrap_or(0),
    })
}

pub fn coll_stats_request(database: &str, query: &Document) -> Result<CollStatsRequest> {
    let collection = match query.value("collstats").or_else(|| query.value("collStats")) {
        Some(Bson::String(name)) => name.clone(),
        _ => {
            return Err(DocWireError::invalid_argument(
                "collStats requires a string collection name",
            ))
        }
    };

    Ok(CollStatsRequest {
        database: database.to_string(),
        collection,
        scale: coll_stats_scale(query)?,
    })
}

/// `scale` is either a bare number or `{ scale: <number> }`.
fn coll_stats_scale(query: &Document) -> Result<i64> {
    let scale = match query.value("scale") {
        None => return Ok(1),
        Some(Bson::Document(inner)) => inner.value("scale").and_then(bson_as_i64),
        Some(value) => bson_as_i64(value),
    };

    match scale {
        Some(scale) if scale > 0 => Ok(scale),
        Some(scale) => Err(DocWireError::invalid_argument(format!(
            "scale has to be > 0, got {}",
            scale
        ))),
        None => Err(DocWireError::invalid_argument(
            "scale must be a number or a document with a numeric 'scale'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_request_defaults() {
        let request = count_request("test", &doc! { "count": "users" }).unwrap();
        assert_eq!(request.collection, "users");
        assert_eq!(request.query, None);
        assert_eq!(request.hint, None);
        assert_eq!(request.limit, 0);
        assert_eq!(request.skip, 0);
    }

    #[test]
    fn test_count_request_optional_fields() {
        let request = count_request(
            "test",
            &doc! { "count": "users", "query": { "age": 30 }, "hint": "age_1", "limit": 10, "skip": 2.0 },
        )
        .unwrap();
        assert_eq!(request.query, Some(doc! { "age": 30 }));
        assert_eq!(request.hint.as_deref(), Some("age_1"));
        assert_eq!(request.limit, 10);
        assert_eq!(request.skip, 2);
    }

    #[test]
    fn test_count_request_requires_string_collection() {
        let err = count_request("test", &doc! { "count": 1 }).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidArgument(_)));

        let err = count_request("test", &doc! { "COUNT": "users" }).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidArgument(_)));
    }

    #[test]
    fn test_coll_stats_accepts_both_spellings() {
        let lower = coll_stats_request("db", &doc! { "collstats": "c" }).unwrap();
        let camel = coll_stats_request("db", &doc! { "collStats": "c" }).unwrap();
        assert_eq!(lower, camel);
        assert_eq!(lower.scale, 1);
    }

    #[test]
    fn test_coll_stats_scale_shapes() {
        assert_eq!(coll_stats_scale(&doc! { "scale": 1024 }).unwrap(), 1024);
        assert_eq!(coll_stats_scale(&doc! { "scale": 1024.0 }).unwrap(), 1024);
        assert_eq!(coll_stats_scale(&doc! { "scale": { "scale": 8_i64 } }).unwrap(), 8);

        for bad in [doc! { "scale": "kb" }, doc! { "scale": { "factor": 2 } }, doc! { "scale": 0 }] {
            let err = coll_stats_scale(&bad).unwrap_err();
            assert!(matches!(err, DocWireError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_null_meta_processor_claims_nothing() {
        let meta = NullMetaQueryProcessor;
        assert!(!meta.is_meta_collection("system.indexes"));

        let request = count_request("db", &doc! { "count": "c" }).unwrap();
        assert!(meta.count(request).await.is_err());
    }
}
