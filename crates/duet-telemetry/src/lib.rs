//! Logging setup shared by hosts embedding the duet auth stack.

pub mod error;
pub mod init;

pub use error::{Result, TelemetryError};
pub use init::{
    AUTH_TARGETS, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging, init_test_logging,
};
