//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all run-control failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Command not permitted in the current lifecycle state.
    IllegalCommand(String),
    /// Command was legal but at least one child did not acknowledge it.
    CommandFailed(String),
    /// Child application launch or control failure.
    Child(String),
    /// Malformed message on the child wire protocol.
    Protocol(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Command sequence interrupted by the operator.
    Cancelled(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::IllegalCommand(msg) => write!(f, "illegal command: {msg}"),
            Self::CommandFailed(msg) => write!(f, "command failed: {msg}"),
            Self::Child(msg) => write!(f, "child: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
