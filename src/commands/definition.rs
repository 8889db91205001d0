/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file definition.rs
 * @brief Command definitions and their invocation behavior
 */

use bson::{Bson, Document};
use tracing::debug;

use crate::document::DocumentExt;
use crate::error::{DocWireError, Result};
use crate::processor::ProcessorCaller;
use crate::request::{GetLogType, WriteConcern};
use crate::wire_protocol::MessageHeader;

/// What a recognized command does once dispatched.
///
/// `Unimplemented` keeps "recognized but not wired" distinct from
/// "not recognized": the former still reaches the backend's
/// `unimplemented` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBehavior {
    Count,
    CollStats,
    Insert,
    Update,
    Delete,
    GetLastError,
    CreateIndexes,
    DeleteIndexes,
    Create,
    Drop,
    Validate,
    WhatsMyUri,
    IsMaster,
    ReplSetGetStatus,
    BuildInfo,
    Ping,
    GetLog,
    ListDatabases,
    GetNonce,
    ListCollections,
    ListIndexes,
    Unimplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDefinition {
    key: &'static str,
    admin_only: bool,
    behavior: CommandBehavior,
}

impl CommandDefinition {
    pub const fn new(key: &'static str, behavior: CommandBehavior) -> Self {
        Self {
            key,
            admin_only: false,
            behavior,
        }
    }

    pub const fn unimplemented(key: &'static str) -> Self {
        Self::new(key, CommandBehavior::Unimplemented)
    }

    pub const fn admin_only(self) -> Self {
        Self {
            admin_only: true,
            ..self
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn is_admin_only(&self) -> bool {
        self.admin_only
    }

    pub fn behavior(&self) -> CommandBehavior {
        self.behavior
    }

    pub async fn call(
        &self,
        header: &MessageHeader,
        query: &Document,
        caller: &mut ProcessorCaller<'_>,
    ) -> Result<()> {
        debug!(
            request_id = header.request_id,
            command = self.key,
            database = caller.database(),
            "invoking command"
        );

        match self.behavior {
            CommandBehavior::Count => caller.count(query).await,
            CommandBehavior::CollStats => caller.coll_stats(query).await,
            CommandBehavior::Insert => caller.insert(query).await,
            CommandBehavior::Update => caller.update(query).await,
            CommandBehavior::Delete => caller.delete(query).await,
            CommandBehavior::GetLastError => {
                let concern = write_concern(query)?;
                caller.get_last_error(concern).await
            }
            CommandBehavior::CreateIndexes => caller.create_indexes(query).await,
            CommandBehavior::DeleteIndexes => caller.delete_indexes(query).await,
            CommandBehavior::Create => caller.create(query).await,
            CommandBehavior::Drop => caller.drop(query).await,
            CommandBehavior::Validate => caller.validate(query).await,
            CommandBehavior::WhatsMyUri => caller.whatsmyuri().await,
            CommandBehavior::IsMaster => caller.is_master().await,
            CommandBehavior::ReplSetGetStatus => caller.repl_set_get_status().await,
            CommandBehavior::BuildInfo => caller.build_info().await,
            CommandBehavior::Ping => caller.ping().await,
            CommandBehavior::GetLog => {
                let filter = self.string_argument(query)?;
                let log = GetLogType::from_filter(filter).ok_or_else(|| {
                    DocWireError::invalid_argument(format!("unknown getLog type: '{}'", filter))
                })?;
                caller.get_log(log).await
            }
            CommandBehavior::ListDatabases => caller.list_databases().await,
            CommandBehavior::GetNonce => caller.get_nonce().await,
            CommandBehavior::ListCollections => caller.list_collections(query).await,
            CommandBehavior::ListIndexes => {
                let collection = self.string_argument(query)?;
                caller.list_indexes(collection).await
            }
            CommandBehavior::Unimplemented => caller.unimplemented(self).await,
        }
    }

    /// Value of the field that named this command, matched the same
    /// case-insensitive way the registry matched it.
    fn string_argument<'d>(&self, query: &'d Document) -> Result<&'d str> {
        let value = query
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(self.key))
            .map(|(_, value)| value);

        match value {
            Some(Bson::String(s)) => Ok(s.as_str()),
            _ => Err(DocWireError::invalid_argument(format!(
                "field '{}' must be a string",
                self.key
            ))),
        }
    }
}

fn write_concern(query: &Document) -> Result<WriteConcern> {
    let defaults = WriteConcern::default();
    Ok(WriteConcern {
        w: query.value("w").cloned().unwrap_or(defaults.w),
        j: query.optional_bool("j")?.unwrap_or(defaults.j),
        fsync: query.optional_bool("fsync")?.unwrap_or(defaults.fsync),
        wtimeout: query.optional_i32("wtimeout")?.unwrap_or(defaults.wtimeout),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_admin_only_builder() {
        const LIST: CommandDefinition =
            CommandDefinition::new("listDatabases", CommandBehavior::ListDatabases).admin_only();
        assert!(LIST.is_admin_only());
        assert_eq!(LIST.key(), "listDatabases");
        assert!(!CommandDefinition::unimplemented("eval").is_admin_only());
    }

    #[test]
    fn test_write_concern_defaults() {
        let concern = write_concern(&doc! { "getLastError": 1 }).unwrap();
        assert_eq!(concern, WriteConcern::default());
    }

    #[test]
    fn test_write_concern_keeps_raw_w() {
        let concern = write_concern(&doc! {
            "getlasterror": 1,
            "w": "majority",
            "j": true,
            "wtimeout": 500,
        })
        .unwrap();
        assert_eq!(concern.w, Bson::String("majority".to_string()));
        assert!(concern.j);
        assert!(!concern.fsync);
        assert_eq!(concern.wtimeout, 500);
    }

    #[test]
    fn test_write_concern_type_mismatch() {
        let err = write_concern(&doc! { "getLastError": 1, "fsync": "yes" }).unwrap_err();
        assert!(matches!(err, DocWireError::InvalidArgument(_)));
    }

    #[test]
    fn test_string_argument_is_case_insensitive() {
        let definition = CommandDefinition::new("getLog", CommandBehavior::GetLog);
        let query = doc! { "getlog": "global" };
        assert_eq!(definition.string_argument(&query).unwrap(), "global");
        assert!(definition.string_argument(&doc! { "getLog": 1 }).is_err());
    }
}
