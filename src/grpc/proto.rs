//! Protocol Buffer messages for the `toolserver` package.
//!
//! Messages are declared directly with `prost` derives; the tonic service plumbing
//! (`tool_service_server`, `tool_service_client`) is generated by `build.rs`.
//!
//! ```text
//! service ToolService {
//!   rpc Configure(ConfigureRequest) returns (ConfigureReply);
//!   rpc ExecuteCommand(Command) returns (CommandReply);
//!   rpc EstimateDuration(Command) returns (EstimateReply);
//!   rpc GetStatus(StatusRequest) returns (StatusReply);
//! }
//! ```
#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureRequest {
    #[prost(string, tag = "1")]
    pub tool_type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub tool_id: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub simulated: bool,
    /// Family-specific connection parameters as a JSON object
    #[prost(string, tag = "4")]
    pub params_json: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigureReply {
    #[prost(enumeration = "ResultCode", tag = "1")]
    pub result: i32,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
}

/// One operation selector plus its arguments.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// JSON-encoded arguments; empty means `{}`
    #[prost(string, tag = "2")]
    pub args_json: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Command {
    #[prost(string, tag = "1")]
    pub tool_type: ::prost::alloc::string::String,
    /// Exactly one entry is accepted
    #[prost(message, repeated, tag = "2")]
    pub operations: ::prost::alloc::vec::Vec<Operation>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandReply {
    #[prost(enumeration = "ResultCode", tag = "1")]
    pub result: i32,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub metadata:
        ::std::collections::HashMap<::prost::alloc::string::String, ::prost::alloc::string::String>,
    #[prost(bool, tag = "4")]
    pub simulated_echo: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EstimateReply {
    #[prost(enumeration = "ResultCode", tag = "1")]
    pub result: i32,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub estimated_duration_seconds: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusReply {
    #[prost(uint64, tag = "1")]
    pub uptime_seconds: u64,
    #[prost(enumeration = "ToolStatus", tag = "2")]
    pub status: i32,
    #[prost(string, tag = "3")]
    pub error_message: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub tool_id: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ResultCode {
    Unspecified = 0,
    Success = 1,
    NotReady = 2,
    WrongTool = 3,
    UnrecognizedCommand = 4,
    InvalidArguments = 5,
    DriverError = 6,
    ErrorFromTool = 7,
    NotConfiguredYet = 8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ToolStatus {
    NotConfigured = 0,
    Ready = 1,
    Busy = 2,
    Failed = 3,
    Simulated = 4,
}

include!(concat!(env!("OUT_DIR"), "/toolserver.ToolService.rs"));

/// Standard gRPC health checking protocol (`grpc.health.v1`).
pub mod health {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HealthCheckRequest {
        #[prost(string, tag = "1")]
        pub service: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct HealthCheckResponse {
        #[prost(enumeration = "health_check_response::ServingStatus", tag = "1")]
        pub status: i32,
    }

    pub mod health_check_response {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum ServingStatus {
            Unknown = 0,
            Serving = 1,
            NotServing = 2,
            ServiceUnknown = 3,
        }
    }

    include!(concat!(env!("OUT_DIR"), "/grpc.health.v1.Health.rs"));
}
