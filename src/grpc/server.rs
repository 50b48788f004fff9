use super::health_service::HealthServiceImpl;
use super::proto::health::health_server::HealthServer;
use super::proto::tool_service_server::ToolServiceServer;
use super::service::ToolServiceImpl;
use crate::driver::Instrument;
use crate::error::AppResult;
use crate::server::ToolServer;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;

/// Serve `ToolService` and `Health` for one instrument until `shutdown` resolves.
///
/// `concurrency_limit` bounds in-flight requests per connection. Commands for the
/// instrument are still executed one at a time by [`ToolServer`].
pub async fn start_server<I, F>(
    server: Arc<ToolServer<I>>,
    addr: SocketAddr,
    concurrency_limit: usize,
    shutdown: F,
) -> AppResult<()>
where
    I: Instrument,
    F: Future<Output = ()>,
{
    let tool_service = ToolServiceImpl::new(Arc::clone(&server));
    let health_service = HealthServiceImpl::new(server.status_register());

    info!(
        %addr,
        tool_type = server.tool_type(),
        concurrency_limit,
        "Tool server listening"
    );

    Server::builder()
        .concurrency_limit_per_connection(concurrency_limit)
        .add_service(ToolServiceServer::new(tool_service))
        .add_service(HealthServer::new(health_service))
        .serve_with_shutdown(addr, shutdown)
        .await?;

    info!("gRPC server stopped");
    Ok(())
}
