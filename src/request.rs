/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file request.rs
 * @brief Normalized backend-facing requests
 */

use bson::{Bson, Document};

/// Normalized plain (non-command) query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub database: String,
    pub collection: String,
    pub query: Document,
    pub projection: Option<Document>,
    pub number_to_skip: u32,
    pub limit: u32,
    pub autoclose: bool,
    pub await_data: bool,
    pub exhaust: bool,
    pub no_cursor_timeout: bool,
    pub oplog_replay: bool,
    pub partial: bool,
    pub slave_ok: bool,
    pub tailable: bool,
}

#[derive(Debug, Clone)]
pub struct QueryRequestBuilder {
    database: String,
    collection: String,
    query: Document,
    projection: Option<Document>,
    number_to_skip: u32,
    limit: i32,
    autoclose: bool,
    await_data: bool,
    exhaust: bool,
    no_cursor_timeout: bool,
    oplog_replay: bool,
    partial: bool,
    slave_ok: bool,
    tailable: bool,
}

impl QueryRequestBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: String::new(),
            query: Document::new(),
            projection: None,
            number_to_skip: 0,
            limit: 0,
            autoclose: false,
            await_data: false,
            exhaust: false,
            no_cursor_timeout: false,
            oplog_replay: false,
            partial: false,
            slave_ok: false,
            tailable: false,
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn query(mut self, query: Document) -> Self {
        self.query = query;
        self
    }

    pub fn projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    pub fn number_to_skip(mut self, number_to_skip: u32) -> Self {
        self.number_to_skip = number_to_skip;
        self
    }

    /// Raw wire `numberToReturn`; sign handling happens in `build`.
    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    pub fn autoclose(mut self, autoclose: bool) -> Self {
        self.autoclose = autoclose;
        self
    }

    pub fn await_data(mut self, value: bool) -> Self {
        self.await_data = value;
        self
    }

    pub fn exhaust(mut self, value: bool) -> Self {
        self.exhaust = value;
        self
    }

    pub fn no_cursor_timeout(mut self, value: bool) -> Self {
        self.no_cursor_timeout = value;
        self
    }

    pub fn oplog_replay(mut self, value: bool) -> Self {
        self.oplog_replay = value;
        self
    }

    pub fn partial(mut self, value: bool) -> Self {
        self.partial = value;
        self
    }

    pub fn slave_ok(mut self, value: bool) -> Self {
        self.slave_ok = value;
        self
    }

    pub fn tailable(mut self, value: bool) -> Self {
        self.tailable = value;
        self
    }

    /// Applies the numberToReturn rules: a negative value or exactly one
    /// closes the cursor after the first batch, and the stored limit is
    /// always the magnitude.
    pub fn build(self) -> QueryRequest {
        let (limit, autoclose) = normalize_limit(self.limit, self.autoclose);

        QueryRequest {
            database: self.database,
            collection: self.collection,
            query: self.query,
            projection: self.projection,
            number_to_skip: self.number_to_skip,
            limit,
            autoclose,
            await_data: self.await_data,
            exhaust: self.exhaust,
            no_cursor_timeout: self.no_cursor_timeout,
            oplog_replay: self.oplog_replay,
            partial: self.partial,
            slave_ok: self.slave_ok,
            tailable: self.tailable,
        }
    }
}

pub fn normalize_limit(raw: i32, autoclose: bool) -> (u32, bool) {
    if raw < 0 {
        (raw.unsigned_abs(), true)
    } else if raw == 1 {
        (1, true)
    } else {
        (raw as u32, autoclose)
    }
}

/// Drivers wrap the filter under `query`/`$query` when they also send
/// sort or hint modifiers.
pub fn extract_query(document: &Document) -> Document {
    for (key, value) in document {
        if key == "query" || key == "$query" {
            if let Bson::Document(inner) = value {
                return inner.clone();
            }
        }
    }
    document.clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountRequest {
    pub database: String,
    pub collection: String,
    pub query: Option<Document>,
    pub hint: Option<String>,
    pub limit: i32,
    pub skip: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollStatsRequest {
    pub database: String,
    pub collection: String,
    pub scale: i64,
}

/// Arguments of getLastError. `w` keeps its raw value: it may be a
/// number or a tag such as "majority".
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConcern {
    pub w: Bson,
    pub j: bool,
    pub fsync: bool,
    pub wtimeout: i32,
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self {
            w: Bson::Int32(1),
            j: false,
            fsync: false,
            wtimeout: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetLogType {
    Global,
    Rs,
    StartupWarnings,
    All,
}

impl GetLogType {
    pub fn from_filter(filter: &str) -> Option<Self> {
        match filter {
            "global" => Some(GetLogType::Global),
            "rs" => Some(GetLogType::Rs),
            "startupWarnings" => Some(GetLogType::StartupWarnings),
            "*" => Some(GetLogType::All),
            _ => None,
        }
    }

    pub fn log_filter(self) -> &'static str {
        match self {
            GetLogType::Global => "global",
            GetLogType::Rs => "rs",
            GetLogType::StartupWarnings => "startupWarnings",
            GetLogType::All => "*",
        }
    }
}
