/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * DocWire - MongoDB wire protocol server
 *
 * @file config.rs
 * @brief DocWire configuration management
 */

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logger::LogLevel;
use crate::wire_protocol::{DEFAULT_MAX_MESSAGE_SIZE, HEADER_SIZE};

pub const CONFIG_PATH_ENV: &str = "DOCWIRE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/docwire.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub max_message_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub detailed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27017,
            max_connections: 1000,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            detailed: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl LoggingConfig {
    pub fn log_level(&self) -> Result<LogLevel> {
        self.level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level '{}'", self.level))
    }
}

impl Config {
    /// Loads `path`, writing the defaults there first if it does not exist.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };

        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Overrides from `DOCWIRE_HOST`, `DOCWIRE_PORT` and `DOCWIRE_LOG_LEVEL`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCWIRE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCWIRE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("DOCWIRE_PORT is not a port number: {}", port))?;
        }
        if let Some(level) = lookup("DOCWIRE_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be greater than zero");
        }
        if self.server.max_message_size < HEADER_SIZE {
            bail!(
                "server.max_message_size must be at least {} bytes, got {}",
                HEADER_SIZE,
                self.server.max_message_size
            );
        }
        self.logging.log_level()?;
        Ok(())
    }
}
