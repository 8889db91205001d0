/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file memory_backend.rs
 * @brief In-memory command backend
 *
 * Databases hold collections, collections hold documents and index
 * specs. Filters are equality matches on (possibly dotted) field paths.
 * Lock guards never live across an await point: every handler builds its
 * reply synchronously and sends it afterwards.
 */

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::document::{bson_as_i64, bson_is_number, DocumentExt};
use crate::error::{DocWireError, Result};
use crate::processor::QueryCommandProcessor;
use crate::reply::{CollStatsReply, CountReply, QueryReply, ReplyChannel, ReplyMessage};
use crate::request::{CollStatsRequest, CountRequest, GetLogType, QueryRequest, WriteConcern};
use crate::wire_protocol::DEFAULT_MAX_MESSAGE_SIZE;

const SERVER_VERSION: &str = "3.0.0";
const MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;
const MAX_WRITE_BATCH_SIZE: i32 = 1000;
const MAX_LOG_LINES: usize = 1024;
const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Clone)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<Document>,
}

impl Collection {
    fn new(namespace: &str) -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![doc! { "v": 1, "key": { "_id": 1 }, "name": ID_INDEX_NAME, "ns": namespace }],
        }
    }

    fn data_size(&self) -> i64 {
        self.documents
            .iter()
            .map(|document| bson::to_vec(document).map(|bytes| bytes.len() as i64).unwrap_or(0))
            .sum()
    }

    fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.iter().filter_map(|index| index.get_str("name").ok())
    }
}

type Database = BTreeMap<String, Collection>;

/// Storage backend living entirely in process memory.
pub struct InMemoryBackend {
    databases: RwLock<BTreeMap<String, Database>>,
    log: Mutex<VecDeque<String>>,
    max_message_size: usize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let backend = Self {
            databases: RwLock::new(BTreeMap::new()),
            log: Mutex::new(VecDeque::new()),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        };
        backend.record(format!("docwire {} starting", SERVER_VERSION));
        backend
    }

    /// Message size limit advertised by isMaster; should match the codec's.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    fn record(&self, line: String) {
        let mut log = self.log.lock();
        if log.len() == MAX_LOG_LINES {
            log.pop_front();
        }
        log.push_back(format!("{} {}", Utc::now().format("%a %b %e %H:%M:%S%.3f"), line));
    }

    fn insert_documents(&self, database: &str, collection: &str, documents: Vec<Document>) -> i64 {
        let mut databases = self.databases.write();
        let target = collection_entry(&mut databases, database, collection);
        let inserted = documents.len() as i64;
        for document in documents {
            target.documents.push(with_object_id(document));
        }
        inserted
    }

    fn find(&self, request: &QueryRequest) -> Result<Vec<Document>> {
        let databases = self.databases.read();
        let Some(collection) = databases
            .get(&request.database)
            .and_then(|database| database.get(&request.collection))
        else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for document in &collection.documents {
            if matches_filter(document, &request.query)? {
                matched.push(document.clone());
            }
        }

        let limit = if request.limit == 0 { usize::MAX } else { request.limit as usize };
        Ok(matched
            .into_iter()
            .skip(request.number_to_skip as usize)
            .take(limit)
            .collect())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn collection_entry<'a>(
    databases: &'a mut BTreeMap<String, Database>,
    database: &str,
    collection: &str,
) -> &'a mut Collection {
    databases
        .entry(database.to_string())
        .or_default()
        .entry(collection.to_string())
        .or_insert_with(|| Collection::new(&format!("{}.{}", database, collection)))
}

fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = document;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        let value = current.get(part)?;
        if parts.peek().is_none() {
            return Some(value);
        }
        match value {
            Bson::Document(inner) => current = inner,
            _ => return None,
        }
    }
    None
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    if bson_is_number(left) && bson_is_number(right) {
        return number_value(left) == number_value(right);
    }
    left == right
}

fn number_value(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Equality match of every filter field; operators are rejected.
fn matches_filter(document: &Document, filter: &Document) -> Result<bool> {
    for (path, expected) in filter {
        if path.starts_with('$') {
            return Err(DocWireError::invalid_argument(format!("unsupported query operator: {}", path)));
        }
        if let Bson::Document(inner) = expected {
            if let Some(operator) = inner.keys().find(|key| key.starts_with('$')) {
                return Err(DocWireError::invalid_argument(format!(
                    "unsupported query operator: {}",
                    operator
                )));
            }
        }

        let matched = match lookup_path(document, path) {
            Some(actual) => values_equal(actual, expected),
            None => matches!(expected, Bson::Null),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn document_array<'a>(command: &'a Document, key: &str) -> Result<Vec<&'a Document>> {
    match command.value(key) {
        Some(Bson::Array(values)) => values
            .iter()
            .map(|value| match value {
                Bson::Document(document) => Ok(document),
                _ => Err(DocWireError::invalid_argument(format!("'{}' must contain only documents", key))),
            })
            .collect(),
        _ => Err(DocWireError::invalid_argument(format!("'{}' must be an array", key))),
    }
}

/// Applies `$set` / `$unset`, or replaces the document keeping its `_id`.
fn apply_update(target: &mut Document, update: &Document) -> Result<()> {
    let is_operator_update = update.keys().next().map_or(false, |key| key.starts_with('$'));
    if !is_operator_update {
        let id = target.get("_id").cloned();
        *target = update.clone();
        if let Some(id) = id {
            target.insert("_id", id);
        }
        return Ok(());
    }

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(DocWireError::invalid_argument(format!("{} requires a document", operator)));
        };
        match operator.as_str() {
            "$set" => {
                for (field, value) in fields {
                    target.insert(field.clone(), value.clone());
                }
            }
            "$unset" => {
                for field in fields.keys() {
                    target.remove(field);
                }
            }
            other => {
                return Err(DocWireError::invalid_argument(format!("unsupported update operator: {}", other)));
            }
        }
    }
    Ok(())
}

/// Seed for an upsert: the filter's equality fields plus the update.
fn upsert_document(filter: &Document, update: &Document) -> Result<Document> {
    let mut document = Document::new();
    for (field, value) in filter {
        if !field.contains('.') {
            document.insert(field.clone(), value.clone());
        }
    }
    apply_update(&mut document, update)?;
    Ok(with_object_id(document))
}

/// Prepends a generated `_id` when the document has none.
fn with_object_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }
    let mut with_id = doc! { "_id": ObjectId::new() };
    for (key, value) in document {
        with_id.insert(key, value);
    }
    with_id
}

fn namespace_not_found(database: &str, collection: &str) -> DocWireError {
    DocWireError::Backend(format!("ns not found: {}.{}", database, collection))
}

fn cursor_reply(namespace: String, first_batch: Vec<Document>) -> ReplyMessage {
    ReplyMessage::single(doc! {
        "cursor": { "id": 0_i64, "ns": namespace, "firstBatch": first_batch },
        "ok": 1.0,
    })
}

#[async_trait]
impl QueryCommandProcessor for InMemoryBackend {
    async fn query(&self, request: QueryRequest) -> Result<QueryReply> {
        let documents = self.find(&request)?;
        debug!("query {}.{} returned {} documents", request.database, request.collection, documents.len());
        Ok(QueryReply {
            starting_from: request.number_to_skip as i32,
            ..QueryReply::new(documents)
        })
    }

    async fn count(&self, request: CountRequest) -> Result<CountReply> {
        let query = QueryRequest {
            database: request.database,
            collection: request.collection,
            query: request.query.unwrap_or_default(),
            projection: None,
            number_to_skip: request.skip.max(0) as u32,
            limit: request.limit.unsigned_abs(),
            autoclose: true,
            await_data: false,
            exhaust: false,
            no_cursor_timeout: false,
            oplog_replay: false,
            partial: false,
            slave_ok: false,
            tailable: false,
        };
        let count = self.find(&query)?.len() as i64;
        Ok(CountReply { count })
    }

    async fn coll_stats(&self, request: CollStatsRequest) -> Result<CollStatsReply> {
        let databases = self.databases.read();
        let collection = databases
            .get(&request.database)
            .and_then(|database| database.get(&request.collection))
            .ok_or_else(|| namespace_not_found(&request.database, &request.collection))?;

        let size = collection.data_size();
        // No real index structures; charge a fixed page per index.
        let index_sizes: Document = collection
            .index_names()
            .map(|name| (name.to_string(), Bson::Int64(4096)))
            .collect();
        let total_index_size = 4096 * index_sizes.len() as i64;

        Ok(CollStatsReply {
            namespace: format!("{}.{}", request.database, request.collection),
            count: collection.documents.len() as i64,
            size,
            storage_size: size,
            total_index_size,
            index_sizes,
            scale: request.scale,
            capped: false,
        })
    }

    async fn insert(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("insert")?;
        let documents = document_array(document, "documents")?
            .into_iter()
            .cloned()
            .collect();

        let n = self.insert_documents(database, collection, documents);
        self.record(format!("insert {}.{} n={}", database, collection, n));
        ReplyMessage::single(doc! { "ok": 1.0, "n": n }).reply(replier).await
    }

    async fn update(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("update")?;
        let statements = document_array(document, "updates")?;

        let reply = {
            let mut databases = self.databases.write();
            let mut matched = 0_i64;
            let mut modified = 0_i64;
            let mut upserted = Vec::new();

            for (index, statement) in statements.into_iter().enumerate() {
                let filter = statement.optional_document("q")?.cloned().unwrap_or_default();
                let update = statement
                    .optional_document("u")?
                    .ok_or_else(|| DocWireError::invalid_argument("update statement requires 'u'"))?;
                let multi = statement.optional_bool("multi")?.unwrap_or(false);
                let upsert = statement.optional_bool("upsert")?.unwrap_or(false);

                let mut hits = 0_i64;
                // Only an upsert may create the namespace.
                if let Some(target) = databases
                    .get_mut(database)
                    .and_then(|database| database.get_mut(collection))
                {
                    for existing in target.documents.iter_mut() {
                        if !matches_filter(existing, &filter)? {
                            continue;
                        }
                        let before = existing.clone();
                        apply_update(existing, update)?;
                        hits += 1;
                        if *existing != before {
                            modified += 1;
                        }
                        if !multi {
                            break;
                        }
                    }
                }

                if hits == 0 && upsert {
                    let created = upsert_document(&filter, update)?;
                    let id = created.get("_id").cloned().unwrap_or(Bson::Null);
                    collection_entry(&mut databases, database, collection)
                        .documents
                        .push(created);
                    upserted.push(doc! { "index": index as i32, "_id": id });
                } else {
                    matched += hits;
                }
            }

            let n = matched + upserted.len() as i64;
            let mut reply = doc! { "ok": 1.0, "n": n, "nModified": modified };
            if !upserted.is_empty() {
                reply.insert("upserted", upserted);
            }
            reply
        };

        self.record(format!("update {}.{}", database, collection));
        ReplyMessage::single(reply).reply(replier).await
    }

    async fn delete(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("delete")?;
        let statements = document_array(document, "deletes")?;

        let removed = {
            let mut databases = self.databases.write();
            let target = databases
                .get_mut(database)
                .and_then(|database| database.get_mut(collection));

            let mut removed = 0_i64;
            if let Some(target) = target {
                for statement in statements {
                    let filter = statement.optional_document("q")?.cloned().unwrap_or_default();
                    let limit = statement.optional_i64("limit")?.unwrap_or(0);

                    let hits = target
                        .documents
                        .iter()
                        .map(|existing| matches_filter(existing, &filter))
                        .collect::<Result<Vec<bool>>>()?;

                    let mut deleted_here = 0_i64;
                    let mut hits = hits.into_iter();
                    target.documents.retain(|_| {
                        let hit = hits.next().unwrap_or(false);
                        if hit && (limit == 0 || deleted_here < limit) {
                            deleted_here += 1;
                            false
                        } else {
                            true
                        }
                    });
                    removed += deleted_here;
                }
            }
            removed
        };

        self.record(format!("delete {}.{} n={}", database, collection, removed));
        ReplyMessage::single(doc! { "ok": 1.0, "n": removed }).reply(replier).await
    }

    async fn get_last_error(&self, concern: WriteConcern, replier: &mut dyn ReplyChannel) -> Result<()> {
        if !bson_is_number(&concern.w) && !matches!(concern.w, Bson::String(_)) {
            return Err(DocWireError::invalid_argument("w has to be a number or a string"));
        }

        ReplyMessage::single(doc! {
            "connectionId": 0,
            "n": 0,
            "syncMillis": 0,
            "writtenTo": Bson::Null,
            "err": Bson::Null,
            "ok": 1.0,
        })
        .reply(replier)
        .await
    }

    async fn create_indexes(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("createIndexes")?;
        let specs = document_array(document, "indexes")?;
        let namespace = format!("{}.{}", database, collection);

        let reply = {
            let mut databases = self.databases.write();
            let created_collection = databases
                .get(database)
                .map_or(true, |existing| !existing.contains_key(collection));
            let target = collection_entry(&mut databases, database, collection);
            let before = target.indexes.len() as i32;

            for spec in specs {
                let key = spec
                    .optional_document("key")?
                    .ok_or_else(|| DocWireError::invalid_argument("index spec requires 'key'"))?;
                let name = match spec.optional_str("name")? {
                    Some(name) => name.to_string(),
                    None => key
                        .iter()
                        .map(|(field, direction)| format!("{}_{}", field, bson_as_i64(direction).unwrap_or(1)))
                        .collect::<Vec<_>>()
                        .join("_"),
                };
                if target.index_names().any(|existing| existing == name) {
                    continue;
                }
                target
                    .indexes
                    .push(doc! { "v": 1, "key": key.clone(), "name": name, "ns": namespace.as_str() });
            }

            doc! {
                "createdCollectionAutomatically": created_collection,
                "numIndexesBefore": before,
                "numIndexesAfter": target.indexes.len() as i32,
                "ok": 1.0,
            }
        };

        ReplyMessage::single(reply).reply(replier).await
    }

    async fn delete_indexes(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = match document.value("dropIndexes").or_else(|| document.value("deleteIndexes")) {
            Some(Bson::String(name)) => name.as_str(),
            _ => return Err(DocWireError::invalid_argument("dropIndexes requires a string collection name")),
        };
        let index = document.required_str("index")?;

        let was = {
            let mut databases = self.databases.write();
            let target = databases
                .get_mut(database)
                .and_then(|db| db.get_mut(collection))
                .ok_or_else(|| namespace_not_found(database, collection))?;
            let was = target.indexes.len() as i32;

            if index == "*" {
                target
                    .indexes
                    .retain(|spec| spec.get_str("name").map_or(false, |name| name == ID_INDEX_NAME));
            } else if index == ID_INDEX_NAME {
                return Err(DocWireError::invalid_argument("cannot drop _id index"));
            } else {
                let before = target.indexes.len();
                target
                    .indexes
                    .retain(|spec| spec.get_str("name").map_or(true, |name| name != index));
                if target.indexes.len() == before {
                    return Err(DocWireError::Backend(format!("index not found with name [{}]", index)));
                }
            }
            was
        };

        ReplyMessage::single(doc! { "nIndexesWas": was, "ok": 1.0 }).reply(replier).await
    }

    async fn create(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("create")?;
        {
            let mut databases = self.databases.write();
            if databases.get(database).map_or(false, |db| db.contains_key(collection)) {
                return Err(DocWireError::Backend("collection already exists".to_string()));
            }
            collection_entry(&mut databases, database, collection);
        }

        self.record(format!("create {}.{}", database, collection));
        ReplyMessage::single(doc! { "ok": 1.0 }).reply(replier).await
    }

    async fn drop(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("drop")?;
        let dropped = {
            let mut databases = self.databases.write();
            let dropped = databases
                .get_mut(database)
                .and_then(|db| db.remove(collection))
                .ok_or_else(|| namespace_not_found(database, collection))?;
            if databases.get(database).map_or(false, |db| db.is_empty()) {
                databases.remove(database);
            }
            dropped
        };

        self.record(format!("drop {}.{}", database, collection));
        ReplyMessage::single(doc! {
            "ns": format!("{}.{}", database, collection),
            "nIndexesWas": dropped.indexes.len() as i32,
            "ok": 1.0,
        })
        .reply(replier)
        .await
    }

    async fn validate(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let collection = document.required_str("validate")?;
        let reply = {
            let databases = self.databases.read();
            let target = databases
                .get(database)
                .and_then(|db| db.get(collection))
                .ok_or_else(|| namespace_not_found(database, collection))?;

            let keys_per_index: Document = target
                .index_names()
                .map(|name| (name.to_string(), Bson::Int64(target.documents.len() as i64)))
                .collect();
            doc! {
                "ns": format!("{}.{}", database, collection),
                "nrecords": target.documents.len() as i64,
                "nIndexes": target.indexes.len() as i32,
                "keysPerIndex": keys_per_index,
                "valid": true,
                "errors": Vec::<Bson>::new(),
                "ok": 1.0,
            }
        };

        ReplyMessage::single(reply).reply(replier).await
    }

    async fn whatsmyuri(&self, peer: Option<SocketAddr>, replier: &mut dyn ReplyChannel) -> Result<()> {
        let you = peer.map(|address| address.to_string()).unwrap_or_else(|| "unknown".to_string());
        ReplyMessage::single(doc! { "you": you, "ok": 1.0 }).reply(replier).await
    }

    async fn is_master(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::single(doc! {
            "ismaster": true,
            "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
            "maxMessageSizeBytes": i32::try_from(self.max_message_size).unwrap_or(i32::MAX),
            "maxWriteBatchSize": MAX_WRITE_BATCH_SIZE,
            "localTime": bson::DateTime::now(),
            "minWireVersion": 0,
            "maxWireVersion": 3,
            "ok": 1.0,
        })
        .reply(replier)
        .await
    }

    async fn repl_set_get_status(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::single(doc! {
            "ok": 0.0,
            "errmsg": "not running with --replSet",
            "code": 76,
        })
        .reply(replier)
        .await
    }

    async fn build_info(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::single(doc! {
            "version": SERVER_VERSION,
            "gitVersion": concat!("docwire-", env!("CARGO_PKG_VERSION")),
            "versionArray": [3, 0, 0, 0],
            "sysInfo": "deprecated",
            "javascriptEngine": "none",
            "bits": 64,
            "debug": cfg!(debug_assertions),
            "maxBsonObjectSize": MAX_BSON_OBJECT_SIZE,
            "ok": 1.0,
        })
        .reply(replier)
        .await
    }

    async fn ping(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        ReplyMessage::single(doc! { "ok": 1.0 }).reply(replier).await
    }

    async fn get_log(&self, log: GetLogType, replier: &mut dyn ReplyChannel) -> Result<()> {
        let reply = match log {
            GetLogType::All => doc! {
                "names": [GetLogType::Global.log_filter(), GetLogType::StartupWarnings.log_filter()],
                "ok": 1.0,
            },
            GetLogType::Global => {
                let lines = self.log.lock();
                doc! {
                    "totalLinesWritten": lines.len() as i32,
                    "log": lines.iter().cloned().collect::<Vec<_>>(),
                    "ok": 1.0,
                }
            }
            GetLogType::StartupWarnings => doc! {
                "totalLinesWritten": 0,
                "log": Vec::<String>::new(),
                "ok": 1.0,
            },
            GetLogType::Rs => doc! {
                "ok": 0.0,
                "errmsg": "no RamLog named: rs",
            },
        };

        ReplyMessage::single(reply).reply(replier).await
    }

    async fn list_databases(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        let reply = {
            let databases = self.databases.read();
            let mut total_size = 0_i64;
            let entries: Vec<Document> = databases
                .iter()
                .map(|(name, collections)| {
                    let size: i64 = collections.values().map(Collection::data_size).sum();
                    total_size += size;
                    doc! {
                        "name": name.as_str(),
                        "sizeOnDisk": size,
                        "empty": collections.values().all(|c| c.documents.is_empty()),
                    }
                })
                .collect();
            doc! { "databases": entries, "totalSize": total_size, "ok": 1.0 }
        };

        ReplyMessage::single(reply).reply(replier).await
    }

    async fn get_nonce(&self, replier: &mut dyn ReplyChannel) -> Result<()> {
        let nonce = format!("{:016x}", rand::random::<u64>());
        ReplyMessage::single(doc! { "nonce": nonce, "ok": 1.0 }).reply(replier).await
    }

    async fn list_collections(&self, database: &str, document: &Document, replier: &mut dyn ReplyChannel) -> Result<()> {
        let filter = document.optional_document("filter")?.cloned().unwrap_or_default();
        let first_batch = {
            let databases = self.databases.read();
            let mut batch = Vec::new();
            for name in databases.get(database).into_iter().flat_map(|db| db.keys()) {
                let entry = doc! { "name": name.as_str(), "options": {} };
                if matches_filter(&entry, &filter)? {
                    batch.push(entry);
                }
            }
            batch
        };

        cursor_reply(format!("{}.$cmd.listCollections", database), first_batch)
            .reply(replier)
            .await
    }

    async fn list_indexes(&self, database: &str, collection: &str, replier: &mut dyn ReplyChannel) -> Result<()> {
        let first_batch = {
            let databases = self.databases.read();
            databases
                .get(database)
                .and_then(|db| db.get(collection))
                .ok_or_else(|| namespace_not_found(database, collection))?
                .indexes
                .clone()
        };

        cursor_reply(format!("{}.{}", database, collection), first_batch)
            .reply(replier)
            .await
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("databases", &self.databases.read().len())
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplyBuffer;

    fn first_reply(buffer: &mut ReplyBuffer) -> Document {
        buffer.take().remove(0).documents.remove(0)
    }

    fn query(database: &str, collection: &str, filter: Document) -> QueryRequest {
        crate::request::QueryRequestBuilder::new(database)
            .collection(collection)
            .query(filter)
            .build()
    }

    #[tokio::test]
    async fn test_insert_then_query_by_equality() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        let command = doc! {
            "insert": "people",
            "documents": [{ "name": "ada", "age": 36 }, { "name": "alan", "age": 41 }],
        };
        backend.insert("test", &command, &mut buffer).await.unwrap();
        assert_eq!(first_reply(&mut buffer).get_i64("n").unwrap(), 2);

        let found = backend.query(query("test", "people", doc! { "age": 41_i64 })).await.unwrap();
        assert_eq!(found.documents.len(), 1);
        assert_eq!(found.documents[0].get_str("name").unwrap(), "alan");
        assert!(found.documents[0].get_object_id("_id").is_ok());
    }

    #[tokio::test]
    async fn test_query_on_missing_collection_is_empty() {
        let backend = InMemoryBackend::new();
        let found = backend.query(query("nope", "nothing", doc! {})).await.unwrap();
        assert!(found.documents.is_empty());
    }

    #[tokio::test]
    async fn test_query_skip_and_limit() {
        let backend = InMemoryBackend::new();
        backend.insert_documents("test", "c", (0..5).map(|i| doc! { "i": i }).collect());

        let mut request = query("test", "c", doc! {});
        request.number_to_skip = 1;
        request.limit = 2;
        let found = backend.query(request).await.unwrap();
        assert_eq!(found.starting_from, 1);
        let values: Vec<i32> = found.documents.iter().map(|d| d.get_i32("i").unwrap()).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_update_set_and_upsert() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.insert_documents("test", "c", vec![doc! { "k": 1, "v": "a" }, doc! { "k": 1, "v": "b" }]);

        let command = doc! {
            "update": "c",
            "updates": [
                { "q": { "k": 1 }, "u": { "$set": { "v": "z" } }, "multi": true },
                { "q": { "k": 2 }, "u": { "$set": { "v": "new" } }, "upsert": true },
            ],
        };
        backend.update("test", &command, &mut buffer).await.unwrap();
        let reply = first_reply(&mut buffer);
        assert_eq!(reply.get_i64("n").unwrap(), 3);
        assert_eq!(reply.get_i64("nModified").unwrap(), 2);
        assert_eq!(reply.get_array("upserted").unwrap().len(), 1);

        let updated = backend.query(query("test", "c", doc! { "v": "z" })).await.unwrap();
        assert_eq!(updated.documents.len(), 2);
        let upserted = backend.query(query("test", "c", doc! { "k": 2 })).await.unwrap();
        assert_eq!(upserted.documents[0].get_str("v").unwrap(), "new");
    }

    #[tokio::test]
    async fn test_update_without_upsert_creates_nothing() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        let command = doc! {
            "update": "ghosts",
            "updates": [{ "q": { "name": "casper" }, "u": { "$set": { "seen": true } } }],
        };
        backend.update("haunted", &command, &mut buffer).await.unwrap();

        let reply = first_reply(&mut buffer);
        assert_eq!(reply.get_i64("n").unwrap(), 0);
        assert!(backend.databases.read().get("haunted").is_none());
    }

    #[tokio::test]
    async fn test_is_master_advertises_configured_message_size() {
        let backend = InMemoryBackend::new().with_max_message_size(1024);
        let mut buffer = ReplyBuffer::default();
        backend.is_master(&mut buffer).await.unwrap();
        assert_eq!(first_reply(&mut buffer).get_i32("maxMessageSizeBytes").unwrap(), 1024);
    }

    #[tokio::test]
    async fn test_replacement_update_keeps_id() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.insert_documents("test", "c", vec![doc! { "_id": 7, "a": 1 }]);

        let command = doc! { "update": "c", "updates": [{ "q": { "_id": 7 }, "u": { "b": 2 } }] };
        backend.update("test", &command, &mut buffer).await.unwrap();

        let found = backend.query(query("test", "c", doc! {})).await.unwrap();
        assert_eq!(found.documents, vec![doc! { "b": 2, "_id": 7 }]);
    }

    #[tokio::test]
    async fn test_delete_respects_limit() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.insert_documents("test", "c", vec![doc! { "k": 1 }, doc! { "k": 1 }, doc! { "k": 2 }]);

        let command = doc! { "delete": "c", "deletes": [{ "q": { "k": 1 }, "limit": 1 }] };
        backend.delete("test", &command, &mut buffer).await.unwrap();
        assert_eq!(first_reply(&mut buffer).get_i64("n").unwrap(), 1);

        let count = backend
            .count(CountRequest {
                database: "test".to_string(),
                collection: "c".to_string(),
                query: None,
                hint: None,
                limit: 0,
                skip: 0,
            })
            .await
            .unwrap();
        assert_eq!(count.count, 2);
    }

    #[tokio::test]
    async fn test_delete_with_bad_filter_keeps_documents() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.insert_documents("test", "c", vec![doc! { "k": 1 }]);

        let command = doc! { "delete": "c", "deletes": [{ "q": { "k": { "$gt": 0 } }, "limit": 0 }] };
        let err = backend.delete("test", &command, &mut buffer).await.unwrap_err();
        assert!(matches!(err, DocWireError::InvalidArgument(_)));

        let found = backend.query(query("test", "c", doc! {})).await.unwrap();
        assert_eq!(found.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_index_lifecycle() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();

        let create = doc! { "createIndexes": "c", "indexes": [{ "key": { "age": 1 } }] };
        backend.create_indexes("test", &create, &mut buffer).await.unwrap();
        let reply = first_reply(&mut buffer);
        assert!(reply.get_bool("createdCollectionAutomatically").unwrap());
        assert_eq!(reply.get_i32("numIndexesAfter").unwrap(), 2);

        backend.list_indexes("test", "c", &mut buffer).await.unwrap();
        let reply = first_reply(&mut buffer);
        let batch = reply.get_document("cursor").unwrap().get_array("firstBatch").unwrap();
        assert_eq!(batch.len(), 2);

        let drop = doc! { "dropIndexes": "c", "index": "age_1" };
        backend.delete_indexes("test", &drop, &mut buffer).await.unwrap();
        assert_eq!(first_reply(&mut buffer).get_i32("nIndexesWas").unwrap(), 2);

        let drop_id = doc! { "deleteIndexes": "c", "index": "_id_" };
        assert!(backend.delete_indexes("test", &drop_id, &mut buffer).await.is_err());
    }

    #[tokio::test]
    async fn test_create_and_drop_collection() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();

        backend.create("test", &doc! { "create": "c" }, &mut buffer).await.unwrap();
        assert!(backend.create("test", &doc! { "create": "c" }, &mut buffer).await.is_err());

        backend.list_collections("test", &doc! { "listCollections": 1 }, &mut buffer).await.unwrap();
        backend.drop("test", &doc! { "drop": "c" }, &mut buffer).await.unwrap();
        assert!(backend.drop("test", &doc! { "drop": "c" }, &mut buffer).await.is_err());

        let replies = buffer.take();
        let listed = replies[1].documents[0].get_document("cursor").unwrap().get_array("firstBatch").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(replies[2].documents[0].get_str("ns").unwrap(), "test.c");
    }

    #[tokio::test]
    async fn test_coll_stats_of_missing_collection_fails() {
        let backend = InMemoryBackend::new();
        let err = backend
            .coll_stats(CollStatsRequest {
                database: "test".to_string(),
                collection: "missing".to_string(),
                scale: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DocWireError::Backend(_)));
    }

    #[tokio::test]
    async fn test_get_last_error_rejects_bad_w() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        let concern = WriteConcern {
            w: Bson::Boolean(true),
            ..WriteConcern::default()
        };
        let err = backend.get_last_error(concern, &mut buffer).await.unwrap_err();
        assert!(matches!(err, DocWireError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_get_nonce_is_hex() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.get_nonce(&mut buffer).await.unwrap();
        let reply = first_reply(&mut buffer);
        let nonce = reply.get_str("nonce").unwrap();
        assert_eq!(nonce.len(), 16);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_global_log_records_writes() {
        let backend = InMemoryBackend::new();
        let mut buffer = ReplyBuffer::default();
        backend.insert_documents("test", "c", vec![doc! {}]);
        backend.create("test", &doc! { "create": "d" }, &mut buffer).await.unwrap();
        buffer.take();

        backend.get_log(GetLogType::Global, &mut buffer).await.unwrap();
        let reply = first_reply(&mut buffer);
        let lines = reply.get_array("log").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].as_str().unwrap().ends_with("create test.d"));
    }
}
