//! gRPC health checking (`grpc.health.v1.Health`) backed by the status register.
//!
//! Serving status is derived from the effective [`ToolStatus`]: an instrument that can
//! accept (or is running) commands is `SERVING`, anything else `NOT_SERVING`.

use super::proto::health::health_check_response::ServingStatus;
use super::proto::health::health_server::Health;
use super::proto::health::{HealthCheckRequest, HealthCheckResponse};
use crate::status::{StatusRegister, ToolStatus};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};

/// Fully qualified name of the tool service, as reported to health clients.
pub const TOOL_SERVICE_NAME: &str = "toolserver.ToolService";

/// Map a tool status onto the health protocol.
pub fn serving_status(status: ToolStatus) -> ServingStatus {
    match status {
        ToolStatus::Ready | ToolStatus::Busy | ToolStatus::Simulated => ServingStatus::Serving,
        ToolStatus::NotConfigured | ToolStatus::Failed => ServingStatus::NotServing,
    }
}

fn response(status: ServingStatus) -> HealthCheckResponse {
    HealthCheckResponse {
        status: status.into(),
    }
}

/// gRPC Health Check Service implementation
#[derive(Debug, Clone)]
pub struct HealthServiceImpl {
    status: Arc<StatusRegister>,
}

impl HealthServiceImpl {
    /// Report health for the server owning `status`.
    pub fn new(status: Arc<StatusRegister>) -> Self {
        Self { status }
    }

    fn is_known(service: &str) -> bool {
        service.is_empty() || service == TOOL_SERVICE_NAME
    }
}

#[tonic::async_trait]
impl Health for HealthServiceImpl {
    type WatchStream =
        Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send + 'static>>;

    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let service = request.into_inner().service;
        if !Self::is_known(&service) {
            return Err(Status::not_found(format!("Unknown service: {service}")));
        }

        Ok(Response::new(response(serving_status(self.status.status()))))
    }

    async fn watch(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        let service = request.into_inner().service;
        if !Self::is_known(&service) {
            // Per the protocol the stream stays open in case the service appears later.
            let stream = tokio_stream::once(Ok(response(ServingStatus::ServiceUnknown)))
                .chain(tokio_stream::pending());
            return Ok(Response::new(Box::pin(stream)));
        }

        let mut last = None;
        let stream = WatchStream::new(self.status.subscribe()).filter_map(move |status| {
            let serving = serving_status(status);
            if last == Some(serving) {
                None
            } else {
                last = Some(serving);
                Some(Ok(response(serving)))
            }
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
