//! Collaborator interface between the protocol layer and concrete instruments.
//!
//! Each instrument server supplies one [`Instrument`]: the factory that turns a
//! configuration payload into a connected [`ToolDriver`], plus the capability set of
//! named operations the dispatcher may route to. The core never calls vendor code any
//! other way.
//!
//! # Example
//!
//! ```rust,ignore
//! use tool_server::driver::{Instrument, ToolDriver};
//! use tool_server::registry::OperationRegistry;
//!
//! struct Balance;
//!
//! impl Instrument for Balance {
//!     type Driver = BalanceDriver;
//!
//!     fn tool_type(&self) -> &'static str { "balance" }
//!
//!     fn operations(&self) -> OperationRegistry<BalanceDriver> {
//!         let mut ops = OperationRegistry::new();
//!         ops.register("tare", |driver, _: NoArgs| async move {
//!             driver.tare().await?;
//!             Ok(None)
//!         }, |_| Ok(2));
//!         ops
//!     }
//!
//!     fn connect(
//!         &self,
//!         payload: ConfigPayload,
//!     ) -> BoxFuture<'static, anyhow::Result<BalanceDriver>> {
//!         Box::pin(async move { BalanceDriver::open(&payload.params).await })
//!     }
//! }
//! ```

use crate::configuration::ConfigPayload;
use crate::registry::OperationRegistry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A connected hardware driver.
///
/// Drivers are shared with in-flight handlers through `Arc`, so any mutable state
/// belongs behind interior mutability.
#[async_trait]
pub trait ToolDriver: Send + Sync + 'static {
    /// Release the hardware connection.
    ///
    /// Called before a replacement driver is constructed, when switching to simulated
    /// mode, and on server shutdown.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Factory and capability set for one instrument family.
pub trait Instrument: Send + Sync + 'static {
    /// Driver type produced by [`Instrument::connect`].
    type Driver: ToolDriver;

    /// Instrument family tag matched against commands and payloads (e.g. `"balance"`).
    fn tool_type(&self) -> &'static str;

    /// Named operations, each with its handler and estimator.
    fn operations(&self) -> OperationRegistry<Self::Driver>;

    /// Configuration hook: validate the payload and open the hardware.
    ///
    /// A returned error marks the server `FAILED` with the error text.
    fn connect(&self, payload: ConfigPayload) -> BoxFuture<'static, anyhow::Result<Self::Driver>>;
}

/// How a handler is being executed.
#[derive(Debug)]
pub enum Execution<D> {
    /// Against the connected hardware
    Hardware(Arc<D>),
    /// As part of a simulated run; no hardware is available
    Simulated,
}

impl<D> Clone for Execution<D> {
    fn clone(&self) -> Self {
        match self {
            Execution::Hardware(driver) => Execution::Hardware(Arc::clone(driver)),
            Execution::Simulated => Execution::Simulated,
        }
    }
}

impl<D> Execution<D> {
    /// Whether this is a simulated run.
    pub fn is_simulated(&self) -> bool {
        matches!(self, Execution::Simulated)
    }

    /// Connected driver, if any.
    pub fn driver(&self) -> Option<&Arc<D>> {
        match self {
            Execution::Hardware(driver) => Some(driver),
            Execution::Simulated => None,
        }
    }
}

/// Tagged driver state owned by the server.
///
/// "No driver yet" is a checked state rather than a stand-in object that accepts
/// every call.
#[derive(Debug)]
pub enum DriverSlot<D> {
    /// Never configured, or the last real configuration failed
    Disconnected,
    /// Simulated mode; commands never reach hardware
    Simulated,
    /// Hardware connected
    Connected(Arc<D>),
}

impl<D> Default for DriverSlot<D> {
    fn default() -> Self {
        DriverSlot::Disconnected
    }
}

impl<D: ToolDriver> DriverSlot<D> {
    /// Whether a hardware driver is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, DriverSlot::Connected(_))
    }

    /// Connected driver, if any.
    pub fn hardware(&self) -> Option<Arc<D>> {
        match self {
            DriverSlot::Connected(driver) => Some(Arc::clone(driver)),
            _ => None,
        }
    }

    /// Close and discard the connected driver, leaving the slot `Disconnected`.
    ///
    /// A no-op for the other states.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        match std::mem::take(self) {
            DriverSlot::Connected(driver) => driver.close().await,
            DriverSlot::Disconnected | DriverSlot::Simulated => Ok(()),
        }
    }
}
