/*!
 * Copyright (c) 2026 DocWire Team. All rights reserved.
 *
 * Logging for DocWire
 * Compact or detailed log lines fed from tracing events, plus connection tracking
 */

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{Level, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{DocWireError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            LogLevel::Debug => "•",
            LogLevel::Info => "✓",
            LogLevel::Warning => "⚠",
            LogLevel::Error => "✗",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO "),
            LogLevel::Warning => write!(f, "WARN "),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE | Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warning,
            Level::ERROR => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocWireLogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub pid: u32,
    pub message: String,
    pub module_path: Option<String>,
    pub line: Option<u32>,
}

impl DocWireLogEvent {
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            pid: std::process::id(),
            message,
            module_path: None,
            line: None,
        }
    }

    pub fn format_compact(&self) -> String {
        format!(
            "{} {} {} : DocWire [{}]",
            self.level.symbol(),
            self.pid,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.message
        )
    }

    pub fn format_detailed(&self) -> String {
        let module_info = match (&self.module_path, self.line) {
            (Some(path), Some(line)) => format!(" {}:{}", path, line),
            (Some(path), None) => format!(" {}", path),
            _ => String::new(),
        };

        format!(
            "{} {} {} {} : DocWire [{}]{}",
            self.level.symbol(),
            self.pid,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.message,
            module_info
        )
    }
}

#[derive(Debug, Clone)]
pub struct DocWireLogger {
    level: LogLevel,
    compact: bool,
}

impl DocWireLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level, compact: true }
    }

    pub fn with_detailed_format(mut self) -> Self {
        self.compact = false;
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn render(&self, event: &DocWireLogEvent) -> String {
        if self.compact {
            event.format_compact()
        } else {
            event.format_detailed()
        }
    }

    pub fn emit(&self, event: DocWireLogEvent) {
        if self.enabled(event.level) {
            eprintln!("{}", self.render(&event));
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.emit(DocWireLogEvent::new(level, message.to_string()));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

static GLOBAL_LOGGER: OnceLock<DocWireLogger> = OnceLock::new();

/// First call wins; later calls keep the installed logger.
pub fn init_logger(level: LogLevel, detailed: bool) {
    let logger = if detailed {
        DocWireLogger::new(level).with_detailed_format()
    } else {
        DocWireLogger::new(level)
    };
    let _ = GLOBAL_LOGGER.set(logger);
}

pub fn get_logger() -> Option<&'static DocWireLogger> {
    GLOBAL_LOGGER.get()
}

#[macro_export]
macro_rules! docwire_debug {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.debug(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! docwire_info {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.info(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! docwire_warn {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.warning(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! docwire_error {
    ($($arg:tt)*) => {
        if let Some(logger) = $crate::logger::get_logger() {
            logger.error(&format!($($arg)*));
        }
    };
}

/// Forwards tracing events to the global logger.
pub struct DocWireTracingLayer;

impl<S> tracing_subscriber::Layer<S> for DocWireTracingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let Some(logger) = get_logger() else {
            return;
        };

        let metadata = event.metadata();
        let level = LogLevel::from(*metadata.level());
        if !logger.enabled(level) {
            return;
        }

        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);

        let mut log_event = DocWireLogEvent::new(level, visitor.into_message(metadata.name()));
        log_event.module_path = metadata.module_path().map(str::to_string);
        log_event.line = metadata.line();
        logger.emit(log_event);
    }
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl LogVisitor {
    fn into_message(self, fallback: &str) -> String {
        let mut message = self.message.unwrap_or_else(|| fallback.to_string());
        if !self.fields.is_empty() {
            message.push(' ');
            message.push_str(&self.fields.join(" "));
        }
        message
    }
}

impl tracing::field::Visit for LogVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Installs the global logger and a tracing subscriber feeding it.
/// `RUST_LOG`, when set, takes precedence over `level` for filtering.
pub fn init_tracing_logger(level: LogLevel, detailed: bool) -> anyhow::Result<()> {
    init_logger(level, detailed);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));

    Registry::default()
        .with(filter)
        .with(DocWireTracingLayer)
        .try_init()?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: u64,
    pub client_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub commands_executed: u64,
}

/// Live connections, bounded by `server.max_connections`.
pub struct ConnectionTracker {
    connections: Mutex<HashMap<u64, ConnectionInfo>>,
    next_id: AtomicU64,
    max_connections: u32,
}

impl ConnectionTracker {
    pub fn new(max_connections: u32) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_connections,
        }
    }

    /// Registers a connection and returns its id.
    pub fn add_connection(&self, client_addr: SocketAddr) -> Result<u64> {
        let mut connections = self.connections.lock();

        if connections.len() >= self.max_connections as usize {
            return Err(DocWireError::ConnectionLimit(self.max_connections));
        }

        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        connections.insert(
            connection_id,
            ConnectionInfo {
                connection_id,
                client_addr,
                connected_at: now,
                last_activity: now,
                commands_executed: 0,
            },
        );
        Ok(connection_id)
    }

    pub fn remove_connection(&self, connection_id: u64) {
        self.connections.lock().remove(&connection_id);
    }

    pub fn increment_commands(&self, connection_id: u64) {
        if let Some(info) = self.connections.lock().get_mut(&connection_id) {
            info.last_activity = Utc::now();
            info.commands_executed += 1;
        }
    }

    pub fn get_connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn get_connection_info(&self, connection_id: u64) -> Option<ConnectionInfo> {
        self.connections.lock().get(&connection_id).cloned()
    }

    pub fn list_connections(&self) -> Vec<ConnectionInfo> {
        self.connections.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!(LogLevel::Error > LogLevel::Info);
    }

    #[test]
    fn test_logger_level_gate() {
        let logger = DocWireLogger::new(LogLevel::Warning);
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Error));
    }

    #[test]
    fn test_detailed_format_includes_location() {
        let logger = DocWireLogger::new(LogLevel::Debug).with_detailed_format();
        let mut event = DocWireLogEvent::new(LogLevel::Info, "listening".to_string());
        event.module_path = Some("docwire::server".to_string());
        event.line = Some(42);

        let line = logger.render(&event);
        assert!(line.contains("DocWire [listening]"));
        assert!(line.ends_with("docwire::server:42"));
    }

    #[test]
    fn test_connection_tracker_enforces_limit() {
        let tracker = ConnectionTracker::new(2);
        let first = tracker.add_connection(addr(5001)).unwrap();
        let second = tracker.add_connection(addr(5002)).unwrap();
        assert_ne!(first, second);

        let err = tracker.add_connection(addr(5003)).unwrap_err();
        assert!(matches!(err, DocWireError::ConnectionLimit(2)));

        tracker.increment_commands(first);
        assert_eq!(tracker.get_connection_info(first).unwrap().commands_executed, 1);

        tracker.remove_connection(first);
        assert_eq!(tracker.get_connection_count(), 1);
        assert!(tracker.add_connection(addr(5004)).is_ok());
        assert_eq!(tracker.list_connections().len(), 2);
    }
}
