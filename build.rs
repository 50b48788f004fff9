//! Build script for the tool server.
//!
//! The protobuf messages are declared with `prost` derives in `src/grpc/proto.rs`,
//! so only the tonic service plumbing (traits, servers, clients) is generated here.
//! This keeps the build free of a `protoc` toolchain requirement.

use tonic_build::manual::{Builder, Method, Service};

const PROST_CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(PROST_CODEC)
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let tool_service = Service::builder()
        .name("ToolService")
        .package("toolserver")
        .method(unary(
            "configure",
            "Configure",
            "crate::grpc::proto::ConfigureRequest",
            "crate::grpc::proto::ConfigureReply",
        ))
        .method(unary(
            "execute_command",
            "ExecuteCommand",
            "crate::grpc::proto::Command",
            "crate::grpc::proto::CommandReply",
        ))
        .method(unary(
            "estimate_duration",
            "EstimateDuration",
            "crate::grpc::proto::Command",
            "crate::grpc::proto::EstimateReply",
        ))
        .method(unary(
            "get_status",
            "GetStatus",
            "crate::grpc::proto::StatusRequest",
            "crate::grpc::proto::StatusReply",
        ))
        .build();

    let health_service = Service::builder()
        .name("Health")
        .package("grpc.health.v1")
        .method(unary(
            "check",
            "Check",
            "crate::grpc::proto::health::HealthCheckRequest",
            "crate::grpc::proto::health::HealthCheckResponse",
        ))
        .method(
            Method::builder()
                .name("watch")
                .route_name("Watch")
                .input_type("crate::grpc::proto::health::HealthCheckRequest")
                .output_type("crate::grpc::proto::health::HealthCheckResponse")
                .codec_path(PROST_CODEC)
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[tool_service, health_service]);
}
