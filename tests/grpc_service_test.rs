//! gRPC surface tests: the service implementations called directly, plus one
//! round trip over a real TCP listener.

mod common;

use common::*;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tonic::Request;
use tool_server::grpc::proto::health::health_check_response::ServingStatus;
use tool_server::grpc::proto::{self, health::HealthCheckRequest};
use tool_server::grpc::{
    start_server, Health, HealthClient, HealthServiceImpl, ToolService, ToolServiceClient,
    ToolServiceImpl, TOOL_SERVICE_NAME,
};
use tool_server::status::UNDEFINED_TOOL_ID;

fn configure_request(params_json: &str) -> proto::ConfigureRequest {
    proto::ConfigureRequest {
        tool_type: BENCH.to_string(),
        tool_id: "bench-7".to_string(),
        simulated: false,
        params_json: params_json.to_string(),
    }
}

fn proto_command(name: &str, args_json: &str) -> proto::Command {
    proto::Command {
        tool_type: BENCH.to_string(),
        operations: vec![proto::Operation {
            name: name.to_string(),
            args_json: args_json.to_string(),
        }],
    }
}

#[tokio::test]
async fn configure_over_the_service_decodes_params() {
    let (server, counters) = bench_server();
    let service = ToolServiceImpl::new(Arc::clone(&server));

    let reply = service
        .configure(Request::new(configure_request(r#"{"port":"COM4"}"#)))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.result(), proto::ResultCode::Success);
    assert!(reply.error_message.is_empty());
    assert_eq!(counters.connects(), 1);

    let status = service
        .get_status(Request::new(proto::StatusRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.status(), proto::ToolStatus::Ready);
    assert_eq!(status.tool_id, "bench-7");
    assert!(status.error_message.is_empty());
}

#[tokio::test]
async fn malformed_params_json_is_invalid_arguments() {
    let (server, counters) = bench_server();
    let service = ToolServiceImpl::new(Arc::clone(&server));

    let reply = service
        .configure(Request::new(configure_request("{port: COM4")))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(reply.result(), proto::ResultCode::InvalidArguments);
    assert!(!reply.error_message.is_empty());
    assert_eq!(counters.connects(), 0);

    let status = service
        .get_status(Request::new(proto::StatusRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.status(), proto::ToolStatus::NotConfigured);
    assert_eq!(status.tool_id, UNDEFINED_TOOL_ID);
    assert_eq!(status.error_message, reply.error_message);
}

#[tokio::test]
async fn execute_and_estimate_report_result_codes() {
    let (server, _) = bench_server();
    let service = ToolServiceImpl::new(Arc::clone(&server));
    service
        .configure(Request::new(configure_request(r#"{"port":"COM4"}"#)))
        .await
        .unwrap();

    let estimate = service
        .estimate_duration(Request::new(proto_command("wait", r#"{"seconds":42}"#)))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(estimate.result(), proto::ResultCode::Success);
    assert_eq!(estimate.estimated_duration_seconds, 42);

    let reply = service
        .execute_command(Request::new(proto_command("tool_error", "")))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::ErrorFromTool);
    assert_eq!(reply.error_message, "sample missing");
    assert_eq!(reply.metadata.get("slot").map(String::as_str), Some("4"));
    assert!(!reply.simulated_echo);

    let reply = service
        .execute_command(Request::new(proto_command("wait", r#"{"seconds":"later"}"#)))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::InvalidArguments);

    let reply = service
        .execute_command(Request::new(proto::Command {
            tool_type: "centrifuge".to_string(),
            operations: vec![],
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::WrongTool);
}

#[tokio::test(start_paused = true)]
async fn simulated_commands_echo_over_the_service() {
    let (server, counters) = bench_server();
    let service = ToolServiceImpl::new(Arc::clone(&server));
    let mut request = configure_request("");
    request.simulated = true;
    service.configure(Request::new(request)).await.unwrap();

    let status = service
        .get_status(Request::new(proto::StatusRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.status(), proto::ToolStatus::Simulated);

    let reply = service
        .execute_command(Request::new(proto_command("ping", "")))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::Success);
    assert!(reply.simulated_echo);
    assert_eq!(counters.handler_calls(), 0);
    assert_eq!(counters.connects(), 0);
}

#[tokio::test]
async fn health_tracks_configuration() {
    let (server, _) = bench_server();
    let health = HealthServiceImpl::new(server.status_register());
    let check = || {
        health.check(Request::new(HealthCheckRequest {
            service: TOOL_SERVICE_NAME.to_string(),
        }))
    };

    assert_eq!(
        check().await.unwrap().into_inner().status(),
        ServingStatus::NotServing
    );

    server.configure(hardware("COM1")).await;
    assert_eq!(
        check().await.unwrap().into_inner().status(),
        ServingStatus::Serving
    );

    server.configure(hardware("busy")).await;
    assert_eq!(
        check().await.unwrap().into_inner().status(),
        ServingStatus::NotServing
    );
}

fn free_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn connect(addr: SocketAddr) -> ToolServiceClient<tonic::transport::Channel> {
    let endpoint = format!("http://{addr}");
    for _ in 0..50 {
        if let Ok(client) = ToolServiceClient::connect(endpoint.clone()).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never accepted connections");
}

#[tokio::test]
async fn round_trip_over_tcp() {
    let (server, counters) = bench_server();
    let addr = free_local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(start_server(Arc::clone(&server), addr, 4, async move {
        let _ = stopped.await;
    }));

    let mut client = connect(addr).await;

    let reply = client
        .configure(configure_request(r#"{"port":"COM9"}"#))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::Success);

    let reply = client
        .execute_command(proto_command("ping", ""))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply.result(), proto::ResultCode::Success);
    assert_eq!(counters.handler_calls(), 1);

    let status = client
        .get_status(proto::StatusRequest {})
        .await
        .unwrap()
        .into_inner();
    assert_eq!(status.status(), proto::ToolStatus::Ready);
    assert_eq!(status.tool_id, "bench-7");

    let mut health = HealthClient::connect(format!("http://{addr}")).await.unwrap();
    let check = health
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(check.status(), ServingStatus::Serving);

    stop.send(()).unwrap();
    serving.await.unwrap().unwrap();
}
