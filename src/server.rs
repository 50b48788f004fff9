//! Per-instrument server facade.
//!
//! [`ToolServer`] composes the status register, configuration manager, dispatcher and
//! duration estimator behind the four RPC entry points. It owns the driver slot
//! behind an async mutex: `ExecuteCommand` and `Configure` take it for their whole
//! duration, so commands run one at a time and a driver is never replaced under a
//! running command. `GetStatus` and `EstimateDuration` only read the status register
//! and never wait on that lock.

use crate::command::{Command, CommandReply, ConfigureReply, EstimateReply};
use crate::configuration::{ConfigPayload, ConfigurationManager};
use crate::dispatcher::{CommandDispatcher, DispatchSettings};
use crate::driver::{DriverSlot, Instrument};
use crate::status::{StatusRegister, StatusSnapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// One instrument server instance.
pub struct ToolServer<I: Instrument> {
    tool_type: &'static str,
    status: Arc<StatusRegister>,
    configuration: ConfigurationManager<I>,
    dispatcher: CommandDispatcher<I::Driver>,
    slot: Mutex<DriverSlot<I::Driver>>,
}

impl<I: Instrument> ToolServer<I> {
    /// Build a server in `NOT_CONFIGURED` around `instrument`.
    pub fn new(instrument: I, settings: DispatchSettings) -> Self {
        let instrument = Arc::new(instrument);
        let tool_type = instrument.tool_type();
        let dispatcher = CommandDispatcher::new(tool_type, instrument.operations(), settings);
        info!(
            tool_type,
            operations = ?dispatcher.registry().names(),
            "Tool server created"
        );

        Self {
            tool_type,
            status: Arc::new(StatusRegister::new()),
            configuration: ConfigurationManager::new(instrument),
            dispatcher,
            slot: Mutex::new(DriverSlot::Disconnected),
        }
    }

    /// Instrument family served by this instance.
    pub fn tool_type(&self) -> &'static str {
        self.tool_type
    }

    /// Registered operation keys, sorted.
    pub fn operations(&self) -> Vec<&'static str> {
        self.dispatcher.registry().names()
    }

    /// Shared handle to the status register (for health reporting).
    pub fn status_register(&self) -> Arc<StatusRegister> {
        Arc::clone(&self.status)
    }

    /// `Configure`: apply a configuration payload.
    #[instrument(skip_all, fields(tool_type = %payload.tool_type, simulated = payload.simulated))]
    pub async fn configure(&self, payload: ConfigPayload) -> ConfigureReply {
        let mut slot = self.slot.lock().await;
        self.configuration
            .apply(&self.status, &mut slot, payload)
            .await
    }

    /// `ExecuteCommand`: run one command to completion.
    ///
    /// Concurrent callers queue on the instance lock and are dispatched in turn.
    #[instrument(skip_all, fields(tool_type = %command.tool_type))]
    pub async fn execute_command(&self, command: Command) -> CommandReply {
        let slot = self.slot.lock().await;
        self.dispatcher.execute(&self.status, &slot, &command).await
    }

    /// `EstimateDuration`: report an operation's duration without running it.
    pub fn estimate_duration(&self, command: &Command) -> EstimateReply {
        self.dispatcher.estimate(&self.status, command)
    }

    /// `GetStatus`: consistent snapshot of the status register.
    pub fn get_status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Close the connected driver, waiting for any running command first.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let mut slot = self.slot.lock().await;
        let was_connected = slot.is_connected();
        let closed = slot.close().await;
        self.status.set_connected(false);
        if was_connected {
            info!(tool_type = self.tool_type, "Driver closed");
        }
        closed
    }
}
