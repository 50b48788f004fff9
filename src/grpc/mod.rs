//! gRPC transport for instrument servers.
//!
//! Exposes one [`ToolServer`](crate::server::ToolServer) as the `toolserver.ToolService`
//! service plus the standard `grpc.health.v1.Health` service.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use tool_server::dispatcher::DispatchSettings;
//! use tool_server::grpc::start_server;
//! use tool_server::instruments::MockStage;
//! use tool_server::server::ToolServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Arc::new(ToolServer::new(MockStage::new(), DispatchSettings::default()));
//!     let addr = "127.0.0.1:50051".parse()?;
//!     start_server(server, addr, 16, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
pub mod convert;
pub mod health_service;
pub mod proto;
pub mod server;
pub mod service;

pub use health_service::{serving_status, HealthServiceImpl, TOOL_SERVICE_NAME};
pub use server::start_server;
pub use service::ToolServiceImpl;

pub use proto::health::health_client::HealthClient;
pub use proto::health::health_server::{Health, HealthServer};
pub use proto::tool_service_client::ToolServiceClient;
pub use proto::tool_service_server::{ToolService, ToolServiceServer};
