//! Configuration payloads and the manager that applies them.
//!
//! A [`ConfigPayload`] fully supersedes the previous one. Applying it either toggles
//! simulated mode (no driver is constructed) or closes the current driver and asks the
//! [`Instrument`] to connect a new one. Connection failures are operational outcomes:
//! they mark the server `FAILED` and come back inside the [`ConfigureReply`], never as
//! transport errors.

use crate::command::{ConfigureReply, ResultCode};
use crate::driver::{DriverSlot, Instrument};
use crate::error::DispatchError;
use crate::status::{StatusRegister, ToolStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for one instrument server.
///
/// `params` carries the family-specific connection parameters (port, address, profile
/// name, ...) and is interpreted only by the instrument's `connect` hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    /// Instrument family the payload is meant for
    #[serde(default)]
    pub tool_type: String,
    /// Opaque identifier; empty leaves the stored identifier unchanged
    #[serde(default)]
    pub tool_id: String,
    /// Answer commands from duration estimates instead of hardware
    #[serde(default)]
    pub simulated: bool,
    /// Family-specific connection parameters
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ConfigPayload {
    /// Real-mode payload for `tool_type` with the given parameters.
    pub fn hardware(tool_type: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            tool_type: tool_type.into(),
            tool_id: String::new(),
            simulated: false,
            params,
        }
    }

    /// Simulated-mode payload for `tool_type`.
    pub fn simulated(tool_type: impl Into<String>) -> Self {
        Self {
            tool_type: tool_type.into(),
            tool_id: String::new(),
            simulated: true,
            params: empty_params(),
        }
    }

    /// Set the tool identifier.
    pub fn with_tool_id(mut self, tool_id: impl Into<String>) -> Self {
        self.tool_id = tool_id.into();
        self
    }

    /// Decode `params` into an instrument's own parameter struct.
    pub fn params_as<P: serde::de::DeserializeOwned>(&self) -> anyhow::Result<P> {
        let params = if self.params.is_null() {
            empty_params()
        } else {
            self.params.clone()
        };
        serde_json::from_value(params)
            .map_err(|e| anyhow::anyhow!("invalid {} parameters: {e}", self.tool_type))
    }
}

/// Validates and applies configuration payloads for one instrument.
pub struct ConfigurationManager<I> {
    instrument: Arc<I>,
}

impl<I: Instrument> ConfigurationManager<I> {
    /// Create a manager for `instrument`.
    pub fn new(instrument: Arc<I>) -> Self {
        Self { instrument }
    }

    /// Check that the payload names exactly this server's instrument family.
    pub fn validate(&self, payload: &ConfigPayload) -> Result<(), DispatchError> {
        let expected = self.instrument.tool_type();
        if payload.tool_type.is_empty() {
            return Err(DispatchError::InvalidArguments(
                "configuration payload names no tool family".to_string(),
            ));
        }
        if payload.tool_type != expected {
            return Err(DispatchError::WrongTool {
                expected: expected.to_string(),
                requested: payload.tool_type.clone(),
            });
        }
        Ok(())
    }

    /// Apply `payload`, replacing the driver held in `slot` as needed.
    ///
    /// The caller must hold the server's command lock for the duration of the call.
    pub async fn apply(
        &self,
        status: &StatusRegister,
        slot: &mut DriverSlot<I::Driver>,
        payload: ConfigPayload,
    ) -> ConfigureReply {
        if let Err(err) = self.validate(&payload) {
            warn!(error = %err, "Rejected configuration payload");
            status.set_error(err.to_string());
            return ConfigureReply::failed(err.result_code(), err.to_string());
        }

        status.set_tool_id(&payload.tool_id);

        if payload.simulated {
            if status.is_simulated() {
                debug!("Already simulated; configuration is a no-op");
                status.clear_error();
                return ConfigureReply::success();
            }

            if let Err(e) = slot.close().await {
                warn!(
                    error = %format!("{e:#}"),
                    "Driver close failed while switching to simulated mode"
                );
            }
            *slot = DriverSlot::Simulated;
            status.set_connected(false);
            status.set_simulated(true);
            status.clear_error();
            info!(
                tool_type = %payload.tool_type,
                tool_id = %status.tool_id(),
                "Switched to simulated mode"
            );
            return ConfigureReply::success();
        }

        // Release the hardware before a replacement tries to open it.
        if let Err(e) = slot.close().await {
            warn!(error = %format!("{e:#}"), "Driver close failed before reconfiguration");
        }
        status.set_connected(false);
        status.set_simulated(false);

        match self.instrument.connect(payload).await {
            Ok(driver) => {
                *slot = DriverSlot::Connected(Arc::new(driver));
                status.set_status(ToolStatus::Ready);
                status.clear_error();
                status.set_connected(true);
                info!(tool_id = %status.tool_id(), "Driver connected");
                ConfigureReply::success()
            }
            Err(e) => {
                let message = format!("{e:#}");
                status.set_status(ToolStatus::Failed);
                status.set_error(&message);
                warn!(error = %message, "Driver configuration failed");
                ConfigureReply::failed(ResultCode::DriverError, message)
            }
        }
    }
}
