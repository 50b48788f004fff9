//! Error types for the tool server.
//!
//! Two families live here and they are deliberately kept apart:
//!
//! - **`ToolServerError`**: process-level failures (loading configuration, binding the
//!   listener, initializing tracing). These abort startup and surface through `main`.
//! - **`DispatchError`**: protocol-level faults detected before any driver call
//!   (not ready, wrong tool, unknown operation, malformed arguments). These never
//!   become transport errors; they are encoded into the reply's result code via
//!   [`DispatchError::result_code`].
//!
//! Driver-level faults are plain `anyhow::Error`s raised by instrument handlers and are
//! converted to `DRIVER_ERROR` at the dispatch boundary.

use crate::command::ResultCode;
use crate::status::ToolStatus;
use std::any::Any;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ToolServerError>;

/// Process-level error type.
#[derive(Error, Debug)]
pub enum ToolServerError {
    /// Configuration sources could not be parsed or merged.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The effective configuration could not be rendered as TOML.
    #[error("Configuration serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Standard I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The gRPC transport failed to bind or serve.
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// `host:port` did not form a valid socket address.
    #[error("Invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// The tracing subscriber could not be installed.
    #[error("Tracing initialization failed: {0}")]
    Tracing(String),

    /// The startup configuration payload was rejected by the instrument.
    #[error("Startup configuration failed ({code:?}): {message}")]
    StartupConfiguration {
        /// Result code reported by the configuration manager
        code: ResultCode,
        /// Failure text
        message: String,
    },
}

/// Protocol-level fault raised while parsing or resolving a command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The server has never been configured and is not simulated.
    #[error("Tool has not been configured yet")]
    NotConfiguredYet,

    /// The server is configured but cannot accept commands right now.
    #[error("Tool is not ready (status: {0})")]
    NotReady(ToolStatus),

    /// The command targets a different instrument family.
    #[error("Command targets tool '{requested}' but this server drives '{expected}'")]
    WrongTool {
        /// Family served by this instance
        expected: String,
        /// Family named by the command (empty when unset)
        requested: String,
    },

    /// No operation was selected, or no handler is registered for it.
    #[error("Unrecognized command: {0}")]
    UnrecognizedCommand(String),

    /// The command could not be decoded into the operation's argument type.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl DispatchError {
    /// Wire result code for this fault.
    pub fn result_code(&self) -> ResultCode {
        match self {
            DispatchError::NotConfiguredYet => ResultCode::NotConfiguredYet,
            DispatchError::NotReady(_) => ResultCode::NotReady,
            DispatchError::WrongTool { .. } => ResultCode::WrongTool,
            DispatchError::UnrecognizedCommand(_) => ResultCode::UnrecognizedCommand,
            DispatchError::InvalidArguments(_) => ResultCode::InvalidArguments,
        }
    }
}

/// Text carried by a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A wire result code with no domain meaning (unspecified or out of range).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Result code {0} does not name a defined outcome")]
pub struct UnknownResultCode(pub i32);
