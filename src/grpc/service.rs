//! `ToolService` gRPC implementation.
//!
//! Thin transport glue over [`ToolServer`]. Protocol and driver faults travel inside
//! the reply's result code; a tonic `Status` error is only returned when the command
//! task itself could not be joined.

use super::proto::tool_service_server::ToolService;
use super::proto::{
    Command as ProtoCommand, CommandReply, ConfigureReply as ProtoConfigureReply,
    ConfigureRequest, EstimateReply, StatusReply, StatusRequest,
};
use crate::command::{Command, ConfigureReply};
use crate::configuration::ConfigPayload;
use crate::driver::Instrument;
use crate::server::ToolServer;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{instrument, warn};

/// gRPC front end for one [`ToolServer`].
pub struct ToolServiceImpl<I: Instrument> {
    server: Arc<ToolServer<I>>,
}

impl<I: Instrument> Clone for ToolServiceImpl<I> {
    fn clone(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
        }
    }
}

impl<I: Instrument> ToolServiceImpl<I> {
    /// Wrap a shared server.
    pub fn new(server: Arc<ToolServer<I>>) -> Self {
        Self { server }
    }
}

fn join_error(err: tokio::task::JoinError) -> Status {
    Status::internal(format!("command task failed: {err}"))
}

#[tonic::async_trait]
impl<I: Instrument> ToolService for ToolServiceImpl<I> {
    #[instrument(skip(self, request), fields(method = "Configure"))]
    async fn configure(
        &self,
        request: Request<ConfigureRequest>,
    ) -> Result<Response<ProtoConfigureReply>, Status> {
        let payload = match ConfigPayload::try_from(request.into_inner()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Undecodable configuration payload");
                self.server.status_register().set_error(err.to_string());
                let reply = ConfigureReply::failed(err.result_code(), err.to_string());
                return Ok(Response::new(reply.into()));
            }
        };

        // A half-applied reconfiguration must not be abandoned by a client disconnect.
        let server = Arc::clone(&self.server);
        let reply = tokio::spawn(async move { server.configure(payload).await })
            .await
            .map_err(join_error)?;
        Ok(Response::new(reply.into()))
    }

    #[instrument(skip(self, request), fields(method = "ExecuteCommand"))]
    async fn execute_command(
        &self,
        request: Request<ProtoCommand>,
    ) -> Result<Response<CommandReply>, Status> {
        let command = Command::from(request.into_inner());

        // Runs to completion even if the caller goes away.
        let server = Arc::clone(&self.server);
        let reply = tokio::spawn(async move { server.execute_command(command).await })
            .await
            .map_err(join_error)?;
        Ok(Response::new(reply.into()))
    }

    #[instrument(skip(self, request), fields(method = "EstimateDuration"))]
    async fn estimate_duration(
        &self,
        request: Request<ProtoCommand>,
    ) -> Result<Response<EstimateReply>, Status> {
        let command = Command::from(request.into_inner());
        let reply = self.server.estimate_duration(&command);
        Ok(Response::new(reply.into()))
    }

    async fn get_status(
        &self,
        _request: Request<StatusRequest>,
    ) -> Result<Response<StatusReply>, Status> {
        Ok(Response::new(self.server.get_status().into()))
    }
}
