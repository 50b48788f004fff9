//! Command dispatch: parse, resolve, execute.
//!
//! [`CommandDispatcher::parse`] performs every protocol-level check before a driver is
//! touched. [`CommandDispatcher::execute`] then runs the resolved operation either
//! against the connected hardware (inside a BUSY window) or, in simulated mode,
//! waits out its duration estimate. Driver faults, including handler panics, are
//! caught here and turned into `DRIVER_ERROR` replies.
//!
//! The dispatcher does not serialize callers itself; [`crate::server::ToolServer`]
//! holds the per-instance lock around `execute`.

use crate::command::{Command, CommandReply, EstimateReply, HandlerResult, ResultCode};
use crate::driver::{DriverSlot, Execution, ToolDriver};
use crate::error::{panic_message, DispatchError};
use crate::estimator::DurationEstimator;
use crate::registry::{OperationRegistry, PreparedOperation};
use crate::status::{StatusRegister, ToolStatus};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Status a server returns to after a handler raised a driver fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverErrorStatus {
    /// Keep accepting commands
    #[default]
    Ready,
    /// Require reconfiguration before the next command
    Failed,
}

impl DriverErrorStatus {
    fn status(self) -> ToolStatus {
        match self {
            DriverErrorStatus::Ready => ToolStatus::Ready,
            DriverErrorStatus::Failed => ToolStatus::Failed,
        }
    }
}

/// Dispatch tuning taken from the `[dispatch]` configuration section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// Status after a `DRIVER_ERROR`
    pub driver_error_status: DriverErrorStatus,
    /// Multiplier applied to estimates when sleeping in simulated mode
    pub simulation_time_scale: f64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            driver_error_status: DriverErrorStatus::Ready,
            simulation_time_scale: 1.0,
        }
    }
}

/// Routes decoded commands to registered operations.
pub struct CommandDispatcher<D> {
    tool_type: &'static str,
    registry: Arc<OperationRegistry<D>>,
    estimator: DurationEstimator,
    driver_error_status: DriverErrorStatus,
}

impl<D: ToolDriver> CommandDispatcher<D> {
    /// Create a dispatcher for the `tool_type` family.
    pub fn new(
        tool_type: &'static str,
        registry: OperationRegistry<D>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            tool_type,
            registry: Arc::new(registry),
            estimator: DurationEstimator::new(settings.simulation_time_scale),
            driver_error_status: settings.driver_error_status,
        }
    }

    /// Instrument family this dispatcher serves.
    pub fn tool_type(&self) -> &'static str {
        self.tool_type
    }

    /// Registered operations.
    pub fn registry(&self) -> &OperationRegistry<D> {
        &self.registry
    }

    /// Run every protocol-level check and resolve the command's operation.
    ///
    /// Order: readiness, tool family, operation selection, handler lookup, argument
    /// decoding. Nothing here changes status.
    pub fn parse(
        &self,
        status: &StatusRegister,
        command: &Command,
    ) -> Result<PreparedOperation<D>, DispatchError> {
        if !status.is_ready() {
            return Err(match status.raw_status() {
                ToolStatus::NotConfigured => DispatchError::NotConfiguredYet,
                other => DispatchError::NotReady(other),
            });
        }

        if command.tool_type != self.tool_type {
            return Err(DispatchError::WrongTool {
                expected: self.tool_type.to_string(),
                requested: command.tool_type.clone(),
            });
        }

        let call = match command.operations.as_slice() {
            [] => {
                return Err(DispatchError::UnrecognizedCommand(
                    "no operation selected".to_string(),
                ))
            }
            [call] => call,
            calls => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                return Err(DispatchError::InvalidArguments(format!(
                    "conflicting operations: {}",
                    names.join(", ")
                )));
            }
        };

        self.registry.prepare(call)
    }

    /// Execute one command and assemble its reply.
    ///
    /// The caller must hold the server's command lock.
    pub async fn execute(
        &self,
        status: &StatusRegister,
        slot: &DriverSlot<D>,
        command: &Command,
    ) -> CommandReply {
        let operation = match self.parse(status, command) {
            Ok(operation) => operation,
            Err(err) => {
                debug!(error = %err, "Command rejected");
                return err.into();
            }
        };

        if status.is_simulated() {
            return self.execute_simulated(status, operation).await;
        }

        match slot.hardware() {
            Some(driver) => self.execute_hardware(status, driver, operation).await,
            None => {
                error!(operation = operation.name(), "Server is ready but no driver is connected");
                CommandReply::from_code(ResultCode::NotReady, "no hardware driver connected")
            }
        }
    }

    /// Estimate one command's duration without executing it.
    pub fn estimate(&self, status: &StatusRegister, command: &Command) -> EstimateReply {
        match self.parse(status, command) {
            Ok(operation) => self.estimator.estimate_reply(&operation),
            Err(err) => err.into(),
        }
    }

    async fn execute_hardware(
        &self,
        status: &StatusRegister,
        driver: Arc<D>,
        operation: PreparedOperation<D>,
    ) -> CommandReply {
        let name = operation.name();
        debug!(operation = name, "Executing on hardware");

        let busy = status.begin_busy();
        let outcome = AssertUnwindSafe(operation.run(Execution::Hardware(driver)))
            .catch_unwind()
            .await;
        let reply = settle(status, name, outcome);

        if reply.result == ResultCode::DriverError {
            busy.release(self.driver_error_status.status());
        } else {
            busy.release(ToolStatus::Ready);
        }
        reply
    }

    async fn execute_simulated(
        &self,
        status: &StatusRegister,
        operation: PreparedOperation<D>,
    ) -> CommandReply {
        let name = operation.name();

        if operation.is_simulation_aware() {
            debug!(operation = name, "Running simulation-aware handler");
            let outcome = AssertUnwindSafe(operation.run(Execution::Simulated))
                .catch_unwind()
                .await;
            return settle(status, name, outcome).echoed();
        }

        let simulated = match self.estimator.estimate(&operation) {
            Ok(seconds) => {
                debug!(operation = name, seconds, "Simulating from estimate");
                self.estimator.wait(seconds).await
            }
            Err(e) => Err(e),
        };

        match simulated {
            Ok(()) => {
                status.clear_error();
                CommandReply::success().echoed()
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(operation = name, error = %message, "Simulated execution failed");
                status.set_error(&message);
                CommandReply::from_code(ResultCode::DriverError, message).echoed()
            }
        }
    }
}

/// Turn a handler outcome into a reply and record its error text.
fn settle(
    status: &StatusRegister,
    operation: &str,
    outcome: Result<HandlerResult, Box<dyn Any + Send>>,
) -> CommandReply {
    match outcome {
        Ok(Ok(None)) => {
            status.clear_error();
            CommandReply::success()
        }
        Ok(Ok(Some(partial))) => {
            if !partial.result.is_success() {
                debug!(
                    operation,
                    result = %partial.result,
                    error = %partial.error_message,
                    "Handler reported failure"
                );
            }
            status.set_error(partial.error_message.clone());
            partial.into()
        }
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            warn!(operation, error = %message, "Driver error");
            status.set_error(&message);
            CommandReply::from_code(ResultCode::DriverError, message)
        }
        Err(payload) => {
            let message = format!("handler panicked: {}", panic_message(&*payload));
            error!(operation, error = %message, "Driver error");
            status.set_error(&message);
            CommandReply::from_code(ResultCode::DriverError, message)
        }
    }
}
