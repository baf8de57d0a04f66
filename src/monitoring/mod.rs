//! Monitoring Module
//!
//! Provides observability for inkblock:
//! - Structured logging

pub mod logging;

pub use logging::{init_logging, LogFormat, LogLevel, LoggerConfig};
