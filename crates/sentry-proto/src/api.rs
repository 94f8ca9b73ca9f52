use serde::{Deserialize, Serialize};

/// Body of `POST /command`. A missing `action` field parses to the empty
/// string, which the action parser maps to `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub action: String,
}

/// Uniform reply envelope for command endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandReply {
    pub fn ok() -> Self {
        Self { status: "ok".into(), message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".into(), message: Some(message.into()) }
    }
}

/// Body of `GET /status`, also relayed verbatim by the controller node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub voltage: f32,
    pub ammo_status: String,
    #[serde(default)]
    pub sabotaged: bool,
}

impl StatusReport {
    /// Placeholder the relay serves when the turret is unreachable.
    pub fn offline() -> Self {
        Self { voltage: 0.0, ammo_status: "OFFLINE".into(), sabotaged: false }
    }
}
