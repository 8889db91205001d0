/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file error.rs
 * @brief DocWire error handling
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocWireError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Message decoder not implemented for opCode {0}")]
    UnimplementedOperation(String),

    #[error("no such cmd: {0}")]
    NoSuchCommand(String),

    #[error("{0} may only be run against the admin database.")]
    AdminOnly(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("command {0} is not implemented")]
    UnimplementedCommand(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::de::Error),

    #[error("BSON encoding error: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Maximum connections ({0}) reached")]
    ConnectionLimit(u32),
}

impl DocWireError {
    /// Numeric error code reported to clients in failure replies.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoSuchCommand(_) => 59,
            Self::AdminOnly(_) => 13,
            Self::InvalidArgument(_) => 2,
            Self::UnimplementedCommand(_) => 115,
            _ => 1,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DocWireError>;
