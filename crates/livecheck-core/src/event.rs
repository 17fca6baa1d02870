use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::challenge::ChallengeType;
use crate::geometry::CenteringGuidance;
use crate::session::LivenessState;

/// Why a session was discarded and regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    Requested,
    Expired,
}

/// Something that happened while processing one frame. A frame that changes
/// nothing produces no events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        state: LivenessState,
    },
    ChallengeCompleted {
        challenge: ChallengeType,
        index: usize,
    },
    SessionCompleted(SessionVerdict),
    SessionReset {
        reason: ResetReason,
        previous_session_id: Uuid,
        session_id: Uuid,
    },
}

/// Final outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionVerdict {
    pub session_id: Uuid,
    pub success: bool,
    pub metadata: CompletionMetadata,
}

/// Metadata attached to a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionMetadata {
    pub timestamp: DateTime<Utc>,
    pub verification_result: bool,
    pub challenge_types: Vec<String>,
    pub session_duration_ms: i64,
    pub lighting_value: f32,
}

impl CompletionMetadata {
    /// Flatten into a key/value map for callers that want untyped metadata.
    pub fn to_map(&self) -> BTreeMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        }
    }
}

/// UI-facing snapshot of the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub state: LivenessState,
    pub progress: f32,
    pub status_message: String,
    pub guidance: Option<CenteringGuidance>,
    pub active_challenge: Option<ChallengeType>,
    pub lighting_value: f32,
    pub is_good_lighting: bool,
    pub glare_detected: bool,
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub events: Vec<SessionEvent>,
    pub status: SessionStatus,
}

impl FrameReport {
    pub fn verdict(&self) -> Option<&SessionVerdict> {
        self.events.iter().find_map(|e| match e {
            SessionEvent::SessionCompleted(v) => Some(v),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_map_keys() {
        let metadata = CompletionMetadata {
            timestamp: Utc::now(),
            verification_result: true,
            challenge_types: vec!["blink".to_string(), "smile".to_string()],
            session_duration_ms: 4200,
            lighting_value: 0.5,
        };
        let map = metadata.to_map();
        assert_eq!(map["verification_result"], serde_json::Value::Bool(true));
        assert_eq!(map["session_duration_ms"], serde_json::json!(4200));
        assert_eq!(map["challenge_types"], serde_json::json!(["blink", "smile"]));
        assert!(map.contains_key("timestamp"));
        assert!(map.contains_key("lighting_value"));
    }
}
