//! Command and reply types shared by every instrument server.
//!
//! A [`Command`] names exactly one instrument family and exactly one operation within
//! it. Operation arguments travel as JSON text and are decoded into the handler's own
//! argument type at dispatch time, so the transport never needs to know the shape of
//! any instrument's operations.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Largest accepted argument payload for a single operation.
pub const MAX_ARGS_LEN: usize = 64 * 1024;

/// Outcome of an `ExecuteCommand`, `EstimateDuration` or `Configure` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    /// The call completed
    Success,
    /// The server is busy or failed
    NotReady,
    /// The command or configuration targets a different instrument family
    WrongTool,
    /// No operation selected, or none registered under that name
    UnrecognizedCommand,
    /// The command or payload could not be decoded
    InvalidArguments,
    /// The driver raised an unexpected fault
    DriverError,
    /// The handler reported an expected business failure
    ErrorFromTool,
    /// The server has never been configured
    NotConfiguredYet,
}

impl ResultCode {
    /// Whether this code means the call succeeded.
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultCode::Success => "SUCCESS",
            ResultCode::NotReady => "NOT_READY",
            ResultCode::WrongTool => "WRONG_TOOL",
            ResultCode::UnrecognizedCommand => "UNRECOGNIZED_COMMAND",
            ResultCode::InvalidArguments => "INVALID_ARGUMENTS",
            ResultCode::DriverError => "DRIVER_ERROR",
            ResultCode::ErrorFromTool => "ERROR_FROM_TOOL",
            ResultCode::NotConfiguredYet => "NOT_CONFIGURED_YET",
        };
        f.write_str(label)
    }
}

/// One operation selection plus its arguments as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCall {
    /// Operation key, matched against the server's registry
    pub name: String,
    /// JSON-encoded arguments; empty means `{}`
    #[serde(default)]
    pub args: String,
}

impl OperationCall {
    /// Build a call from a JSON value.
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args: args.to_string(),
        }
    }

    /// Build a call with no arguments.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: String::new(),
        }
    }

    /// Build a call from any serializable argument struct.
    pub fn with_args<A: Serialize>(
        name: impl Into<String>,
        args: &A,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: name.into(),
            args: serde_json::to_string(args)?,
        })
    }

    /// Parse the argument text, treating empty input as an empty object.
    pub fn args_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.args.trim().is_empty() {
            Ok(serde_json::Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_str(&self.args)
        }
    }
}

/// A decoded command: one tool family, one operation.
///
/// `operations` mirrors the inner oneof of the wire message; anything other than a
/// single entry is rejected during dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Instrument family this command is meant for (empty when unset)
    pub tool_type: String,
    /// Selected operation(s)
    #[serde(default)]
    pub operations: Vec<OperationCall>,
}

impl Command {
    /// Command selecting a single operation.
    pub fn new(tool_type: impl Into<String>, operation: OperationCall) -> Self {
        Self {
            tool_type: tool_type.into(),
            operations: vec![operation],
        }
    }
}

/// Reply fragment a handler may return instead of plain success.
///
/// Returned replies are propagated as-is, and their `error_message` becomes the
/// server's last error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialReply {
    /// Result code to report
    pub result: ResultCode,
    /// Error text, empty on success
    pub error_message: String,
    /// Free-form key/value output
    pub metadata: HashMap<String, String>,
}

impl PartialReply {
    /// Successful reply carrying metadata only.
    pub fn success() -> Self {
        Self {
            result: ResultCode::Success,
            error_message: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Expected, handler-reported failure (`ERROR_FROM_TOOL`).
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self {
            result: ResultCode::ErrorFromTool,
            error_message: message.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }
}

/// What a handler returns: `Ok(None)` for plain success, `Ok(Some(_))` for an explicit
/// reply, `Err(_)` for a driver fault.
pub type HandlerResult = anyhow::Result<Option<PartialReply>>;

/// Reply to `ExecuteCommand`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Outcome
    pub result: ResultCode,
    /// Error text, empty on success
    pub error_message: String,
    /// Free-form key/value output
    pub metadata: HashMap<String, String>,
    /// Set when the reply was produced by simulated execution
    pub simulated_echo: bool,
}

impl CommandReply {
    /// Plain success.
    pub fn success() -> Self {
        Self::from_code(ResultCode::Success, String::new())
    }

    /// Reply with a code and message and no metadata.
    pub fn from_code(result: ResultCode, error_message: impl Into<String>) -> Self {
        Self {
            result,
            error_message: error_message.into(),
            metadata: HashMap::new(),
            simulated_echo: false,
        }
    }

    /// Mark the reply as produced by simulated execution.
    pub fn echoed(mut self) -> Self {
        self.simulated_echo = true;
        self
    }
}

impl From<PartialReply> for CommandReply {
    fn from(reply: PartialReply) -> Self {
        Self {
            result: reply.result,
            error_message: reply.error_message,
            metadata: reply.metadata,
            simulated_echo: false,
        }
    }
}

impl From<crate::error::DispatchError> for CommandReply {
    fn from(err: crate::error::DispatchError) -> Self {
        Self::from_code(err.result_code(), err.to_string())
    }
}

/// Reply to `EstimateDuration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateReply {
    /// Outcome
    pub result: ResultCode,
    /// Error text, empty on success
    pub error_message: String,
    /// Expected execution time in whole seconds
    pub estimated_duration_seconds: u64,
}

impl EstimateReply {
    /// Successful estimate.
    pub fn seconds(estimated_duration_seconds: u64) -> Self {
        Self {
            result: ResultCode::Success,
            error_message: String::new(),
            estimated_duration_seconds,
        }
    }

    /// Failed estimate.
    pub fn failed(result: ResultCode, error_message: impl Into<String>) -> Self {
        Self {
            result,
            error_message: error_message.into(),
            estimated_duration_seconds: 0,
        }
    }
}

impl From<crate::error::DispatchError> for EstimateReply {
    fn from(err: crate::error::DispatchError) -> Self {
        Self::failed(err.result_code(), err.to_string())
    }
}

/// Reply to `Configure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureReply {
    /// Outcome
    pub result: ResultCode,
    /// Error text, empty on success
    pub error_message: String,
}

impl ConfigureReply {
    /// Successful configuration.
    pub fn success() -> Self {
        Self {
            result: ResultCode::Success,
            error_message: String::new(),
        }
    }

    /// Failed configuration.
    pub fn failed(result: ResultCode, error_message: impl Into<String>) -> Self {
        Self {
            result,
            error_message: error_message.into(),
        }
    }
}
