//! # Tool Server Core Library
//!
//! Generic protocol layer shared by every laboratory-instrument control server: a
//! command dispatch engine, a device status state machine, and a simulation and
//! estimation subsystem. Each instrument server plugs one
//! [`Instrument`](driver::Instrument) into a [`ToolServer`](server::ToolServer) and
//! mounts it behind the gRPC transport.
//!
//! ## Crate Structure
//!
//! - **`status`**: `ToolStatus` and the `StatusRegister` that owns status, the
//!   simulated flag and the last error.
//! - **`command`**: commands, operation calls, result codes and reply types.
//! - **`registry`**: explicit map from operation key to handler and estimator.
//! - **`driver`**: the `Instrument` and `ToolDriver` collaborator traits and the tagged
//!   `DriverSlot`.
//! - **`estimator`**: duration estimates and simulated waiting.
//! - **`dispatcher`**: parses, resolves and executes commands.
//! - **`configuration`**: `ConfigPayload` and the `ConfigurationManager`.
//! - **`server`**: the `ToolServer` facade serializing commands per instance.
//! - **`grpc`**: `ToolService` and `Health` over tonic.
//! - **`instruments`**: the bench-test `MockStage`.
//! - **`config`**: figment-based server configuration.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: `ToolServerError` and `DispatchError`.

pub mod command;
pub mod config;
pub mod configuration;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod grpc;
pub mod instruments;
pub mod logging;
pub mod registry;
pub mod server;
pub mod status;

pub use command::{Command, CommandReply, ConfigureReply, EstimateReply, OperationCall, ResultCode};
pub use configuration::ConfigPayload;
pub use driver::{Instrument, ToolDriver};
pub use error::{AppResult, DispatchError, ToolServerError};
pub use server::ToolServer;
pub use status::{StatusSnapshot, ToolStatus};
