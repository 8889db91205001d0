/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file mod.rs
 * @brief Command registry: case-insensitive lookup over every command group
 */

pub mod definition;
pub mod groups;

use std::collections::HashMap;
use std::fmt;

use bson::Document;
use tracing::debug;

use crate::error::{DocWireError, Result};

pub use definition::{CommandBehavior, CommandDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandGroup {
    Aggregation,
    Geospatial,
    QueryAndWriteOperations,
    Authentication,
    UserManagement,
    RoleManagement,
    Replication,
    Sharding,
    Administration,
    Diagnostic,
    Internal,
    Testing,
    SystemEventsAuditing,
}

impl CommandGroup {
    pub const ALL: [CommandGroup; 13] = [
        CommandGroup::Aggregation,
        CommandGroup::Geospatial,
        CommandGroup::QueryAndWriteOperations,
        CommandGroup::Authentication,
        CommandGroup::UserManagement,
        CommandGroup::RoleManagement,
        CommandGroup::Replication,
        CommandGroup::Sharding,
        CommandGroup::Administration,
        CommandGroup::Diagnostic,
        CommandGroup::Internal,
        CommandGroup::Testing,
        CommandGroup::SystemEventsAuditing,
    ];

    pub fn commands(self) -> &'static [CommandDefinition] {
        match self {
            CommandGroup::Aggregation => groups::AGGREGATION,
            CommandGroup::Geospatial => groups::GEOSPATIAL,
            CommandGroup::QueryAndWriteOperations => groups::QUERY_AND_WRITE_OPERATIONS,
            CommandGroup::Authentication => groups::AUTHENTICATION,
            CommandGroup::UserManagement => groups::USER_MANAGEMENT,
            CommandGroup::RoleManagement => groups::ROLE_MANAGEMENT,
            CommandGroup::Replication => groups::REPLICATION,
            CommandGroup::Sharding => groups::SHARDING,
            CommandGroup::Administration => groups::ADMINISTRATION,
            CommandGroup::Diagnostic => groups::DIAGNOSTIC,
            CommandGroup::Internal => groups::INTERNAL,
            CommandGroup::Testing => groups::TESTING,
            CommandGroup::SystemEventsAuditing => groups::SYSTEM_EVENTS_AUDITING,
        }
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy)]
struct RegisteredCommand {
    group: CommandGroup,
    definition: &'static CommandDefinition,
}

/// Immutable name → definition table shared by every connection.
#[derive(Debug)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    /// Registry over the full command catalogue.
    pub fn standard() -> Result<Self> {
        Self::build(CommandGroup::ALL.iter().map(|group| (*group, group.commands())))
    }

    /// Builds a registry, failing on the first key registered twice.
    pub fn build<I>(groups: I) -> Result<Self>
    where
        I: IntoIterator<Item = (CommandGroup, &'static [CommandDefinition])>,
    {
        let mut commands: HashMap<String, RegisteredCommand> = HashMap::new();

        for (group, definitions) in groups {
            for definition in definitions {
                // Some drivers send lower-cased command names.
                let key = definition.key().to_lowercase();
                if let Some(existing) = commands.get(&key) {
                    return Err(DocWireError::Configuration(format!(
                        "Key {} is not unique, found in group {} and in group {}",
                        key, existing.group, group
                    )));
                }
                commands.insert(key, RegisteredCommand { group, definition });
            }
        }

        debug!("Registered {} commands", commands.len());
        Ok(Self { commands })
    }

    /// First field name (in document order) naming a registered command.
    pub fn lookup(&self, document: &Document) -> Option<&'static CommandDefinition> {
        document
            .keys()
            .find_map(|name| self.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&'static CommandDefinition> {
        self.commands
            .get(&name.to_lowercase())
            .map(|registered| registered.definition)
    }

    pub fn group_of(&self, name: &str) -> Option<CommandGroup> {
        self.commands
            .get(&name.to_lowercase())
            .map(|registered| registered.group)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.values().map(|registered| registered.definition.key())
    }
}
