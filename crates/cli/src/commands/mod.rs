pub mod config;
pub mod demo;
pub mod recommend;

use serde::Serialize;
use serde_json::Value;
use wattwise_core::{EngineError, InterfaceError};

pub const EXIT_OK: u8 = 0;
pub const EXIT_INTERNAL: u8 = 1;
pub const EXIT_INPUT: u8 = 2;
pub const EXIT_NO_ELIGIBLE_PLANS: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(payload) }
    }

    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: EXIT_OK, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a fatal engine error onto the CLI exit-code contract.
    pub fn engine_failure(command: &str, error: EngineError, correlation_id: &str) -> Self {
        let error_class = error.error_class();
        let detail = error.to_string();
        let exclusions = match &error {
            EngineError::NoEligiblePlans { exclusions } => serde_json::to_value(exclusions).ok(),
            _ => None,
        };
        let interface = error.into_interface(correlation_id);
        let exit_code = match interface {
            InterfaceError::BadRequest { .. } => EXIT_INPUT,
            InterfaceError::NoMatchingPlans { .. } => EXIT_NO_ELIGIBLE_PLANS,
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                EXIT_INTERNAL
            }
        };

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: exclusions,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
