//! Error types for mptcpctl

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetctlError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Command execution failed
    #[error("Command '{cmd}' failed{}: {stderr}", .code.map(|c| format!(" with code {}", c)).unwrap_or_default())]
    CommandFailed { cmd: String, code: Option<i32>, stderr: String },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Interface not found
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// Routing table outside the interface table set
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),
}

pub type NetctlResult<T> = Result<T, NetctlError>;
