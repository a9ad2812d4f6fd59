use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of events emitted to the telemetry sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A single skill was selected and served
    SkillServed,

    /// No skill scored above the minimum
    NoMatch,

    /// Several skills scored too close to auto-select
    AmbiguousMatch,

    /// An asset was read and returned
    AssetServed,

    /// A server-side script ran (or timed out)
    ScriptExecuted,

    /// The index was rebuilt on request or schedule
    RefreshPerformed,

    /// Caller feedback about a served skill
    SkillFeedback,
}

/// A telemetry event with a free-form payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub server_id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl TelemetryEvent {
    pub fn new(
        event_type: EventType,
        server_id: impl Into<String>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            server_id: server_id.into(),
            data,
        }
    }
}
