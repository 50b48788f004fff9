//! Conversions between wire messages and domain types.

use super::proto;
use crate::command::{
    Command, CommandReply, ConfigureReply, EstimateReply, OperationCall, ResultCode,
};
use crate::configuration::ConfigPayload;
use crate::error::{DispatchError, UnknownResultCode};
use crate::status::{StatusSnapshot, ToolStatus};

impl From<ResultCode> for proto::ResultCode {
    fn from(code: ResultCode) -> Self {
        match code {
            ResultCode::Success => proto::ResultCode::Success,
            ResultCode::NotReady => proto::ResultCode::NotReady,
            ResultCode::WrongTool => proto::ResultCode::WrongTool,
            ResultCode::UnrecognizedCommand => proto::ResultCode::UnrecognizedCommand,
            ResultCode::InvalidArguments => proto::ResultCode::InvalidArguments,
            ResultCode::DriverError => proto::ResultCode::DriverError,
            ResultCode::ErrorFromTool => proto::ResultCode::ErrorFromTool,
            ResultCode::NotConfiguredYet => proto::ResultCode::NotConfiguredYet,
        }
    }
}

/// Decode a raw wire value. `UNSPECIFIED` and unknown values are errors, never success.
impl TryFrom<i32> for ResultCode {
    type Error = UnknownResultCode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match proto::ResultCode::try_from(value) {
            Ok(proto::ResultCode::Success) => Ok(ResultCode::Success),
            Ok(proto::ResultCode::NotReady) => Ok(ResultCode::NotReady),
            Ok(proto::ResultCode::WrongTool) => Ok(ResultCode::WrongTool),
            Ok(proto::ResultCode::UnrecognizedCommand) => Ok(ResultCode::UnrecognizedCommand),
            Ok(proto::ResultCode::InvalidArguments) => Ok(ResultCode::InvalidArguments),
            Ok(proto::ResultCode::DriverError) => Ok(ResultCode::DriverError),
            Ok(proto::ResultCode::ErrorFromTool) => Ok(ResultCode::ErrorFromTool),
            Ok(proto::ResultCode::NotConfiguredYet) => Ok(ResultCode::NotConfiguredYet),
            Ok(proto::ResultCode::Unspecified) | Err(_) => Err(UnknownResultCode(value)),
        }
    }
}

impl From<ToolStatus> for proto::ToolStatus {
    fn from(status: ToolStatus) -> Self {
        match status {
            ToolStatus::NotConfigured => proto::ToolStatus::NotConfigured,
            ToolStatus::Ready => proto::ToolStatus::Ready,
            ToolStatus::Busy => proto::ToolStatus::Busy,
            ToolStatus::Failed => proto::ToolStatus::Failed,
            ToolStatus::Simulated => proto::ToolStatus::Simulated,
        }
    }
}

impl From<proto::ToolStatus> for ToolStatus {
    fn from(status: proto::ToolStatus) -> Self {
        match status {
            proto::ToolStatus::NotConfigured => ToolStatus::NotConfigured,
            proto::ToolStatus::Ready => ToolStatus::Ready,
            proto::ToolStatus::Busy => ToolStatus::Busy,
            proto::ToolStatus::Failed => ToolStatus::Failed,
            proto::ToolStatus::Simulated => ToolStatus::Simulated,
        }
    }
}

impl From<proto::Operation> for OperationCall {
    fn from(operation: proto::Operation) -> Self {
        Self {
            name: operation.name,
            args: operation.args_json,
        }
    }
}

impl From<OperationCall> for proto::Operation {
    fn from(call: OperationCall) -> Self {
        Self {
            name: call.name,
            args_json: call.args,
        }
    }
}

impl From<proto::Command> for Command {
    fn from(command: proto::Command) -> Self {
        Self {
            tool_type: command.tool_type,
            operations: command.operations.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Command> for proto::Command {
    fn from(command: Command) -> Self {
        Self {
            tool_type: command.tool_type,
            operations: command.operations.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<proto::ConfigureRequest> for ConfigPayload {
    type Error = DispatchError;

    fn try_from(request: proto::ConfigureRequest) -> Result<Self, Self::Error> {
        let params = if request.params_json.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&request.params_json).map_err(|e| {
                DispatchError::InvalidArguments(format!("malformed configuration parameters: {e}"))
            })?
        };
        if !params.is_object() {
            return Err(DispatchError::InvalidArguments(
                "configuration parameters must be a JSON object".to_string(),
            ));
        }

        Ok(Self {
            tool_type: request.tool_type,
            tool_id: request.tool_id,
            simulated: request.simulated,
            params,
        })
    }
}

impl From<ConfigPayload> for proto::ConfigureRequest {
    fn from(payload: ConfigPayload) -> Self {
        let params_json = if payload.params.is_null() {
            String::new()
        } else {
            payload.params.to_string()
        };
        Self {
            tool_type: payload.tool_type,
            tool_id: payload.tool_id,
            simulated: payload.simulated,
            params_json,
        }
    }
}

impl From<ConfigureReply> for proto::ConfigureReply {
    fn from(reply: ConfigureReply) -> Self {
        Self {
            result: proto::ResultCode::from(reply.result).into(),
            error_message: reply.error_message,
        }
    }
}

impl From<CommandReply> for proto::CommandReply {
    fn from(reply: CommandReply) -> Self {
        Self {
            result: proto::ResultCode::from(reply.result).into(),
            error_message: reply.error_message,
            metadata: reply.metadata,
            simulated_echo: reply.simulated_echo,
        }
    }
}

impl From<EstimateReply> for proto::EstimateReply {
    fn from(reply: EstimateReply) -> Self {
        Self {
            result: proto::ResultCode::from(reply.result).into(),
            error_message: reply.error_message,
            estimated_duration_seconds: reply.estimated_duration_seconds,
        }
    }
}

impl From<StatusSnapshot> for proto::StatusReply {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            uptime_seconds: snapshot.uptime.as_secs(),
            status: proto::ToolStatus::from(snapshot.status).into(),
            error_message: snapshot.error.unwrap_or_default(),
            tool_id: snapshot.tool_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn unspecified_result_code_is_not_success() {
        assert_eq!(
            ResultCode::try_from(proto::ResultCode::Unspecified as i32),
            Err(UnknownResultCode(0))
        );
        assert_eq!(ResultCode::try_from(42), Err(UnknownResultCode(42)));
        assert_eq!(
            ResultCode::try_from(proto::ResultCode::ErrorFromTool as i32),
            Ok(ResultCode::ErrorFromTool)
        );
    }

    #[test]
    fn every_domain_code_survives_the_wire() {
        for code in [
            ResultCode::Success,
            ResultCode::NotReady,
            ResultCode::WrongTool,
            ResultCode::UnrecognizedCommand,
            ResultCode::InvalidArguments,
            ResultCode::DriverError,
            ResultCode::ErrorFromTool,
            ResultCode::NotConfiguredYet,
        ] {
            let wire: i32 = proto::ResultCode::from(code).into();
            assert_eq!(ResultCode::try_from(wire), Ok(code));
        }
    }

    #[test]
    fn configure_request_params_are_parsed() {
        let payload = ConfigPayload::try_from(proto::ConfigureRequest {
            tool_type: "mock_stage".into(),
            tool_id: "stage-1".into(),
            simulated: false,
            params_json: r#"{"port":"/dev/ttyUSB0"}"#.into(),
        })
        .unwrap();
        assert_eq!(payload.params, json!({ "port": "/dev/ttyUSB0" }));
        assert_eq!(payload.tool_id, "stage-1");

        let empty = ConfigPayload::try_from(proto::ConfigureRequest {
            tool_type: "mock_stage".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(empty.params, json!({}));
    }

    #[test]
    fn malformed_configure_params_are_invalid_arguments() {
        for params_json in ["{port:", "[1, 2]"] {
            let err = ConfigPayload::try_from(proto::ConfigureRequest {
                tool_type: "mock_stage".into(),
                params_json: params_json.into(),
                ..Default::default()
            })
            .unwrap_err();
            assert_eq!(err.result_code(), ResultCode::InvalidArguments);
        }
    }

    #[test]
    fn snapshot_reports_effective_status_and_whole_seconds() {
        let reply = proto::StatusReply::from(StatusSnapshot {
            status: ToolStatus::Simulated,
            raw_status: ToolStatus::Failed,
            simulated: true,
            uptime: Duration::from_millis(2_900),
            error: None,
            tool_id: "undefined".into(),
            connected: false,
        });

        assert_eq!(reply.status(), proto::ToolStatus::Simulated);
        assert_eq!(reply.uptime_seconds, 2);
        assert!(reply.error_message.is_empty());
    }

    #[test]
    fn command_reply_keeps_metadata_and_echo() {
        let reply = proto::CommandReply::from(
            CommandReply::from_code(ResultCode::Success, "").echoed(),
        );
        assert_eq!(reply.result(), proto::ResultCode::Success);
        assert!(reply.simulated_echo);
    }
}
