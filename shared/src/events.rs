use serde::{Deserialize, Serialize};

use crate::error::BoardError;
use crate::view::TeamView;

/// Payload published to the presentation sink at the end of every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    Dashboard {
        #[serde(default)]
        seq: u64,
        teams: Vec<TeamView>,
        timestamp: String,
    },
    Error {
        #[serde(default)]
        seq: u64,
        kind: String,
        message: String,
        timestamp: String,
    },
}

impl BoardEvent {
    pub fn failure(seq: u64, error: &BoardError, timestamp: String) -> Self {
        BoardEvent::Error {
            seq,
            kind: error.kind().to_string(),
            message: error.message().to_string(),
            timestamp,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            BoardEvent::Dashboard { seq, .. } | BoardEvent::Error { seq, .. } => *seq,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            BoardEvent::Dashboard { .. } => "dashboard",
            BoardEvent::Error { .. } => "error",
        }
    }
}

/// Content fingerprint of a serialized payload, used in cache validators.
pub fn payload_fingerprint(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::{BoardEvent, payload_fingerprint};
    use crate::error::BoardError;

    #[test]
    fn error_event_carries_kind_and_message() {
        let err = BoardError::TransportFailure("upstream status 503".to_string());
        let event = BoardEvent::failure(4, &err, "2026-01-01T00:00:00Z".to_string());
        let json = serde_json::to_value(&event).expect("event should serialize");

        assert_eq!(json["type"], "Error");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["kind"], "transport_failure");
        assert_eq!(json["message"], "upstream status 503");
        assert_eq!(event.event_name(), "error");
    }

    #[test]
    fn dashboard_event_parses_without_seq() {
        let event: BoardEvent =
            serde_json::from_str(r#"{"type":"Dashboard","teams":[],"timestamp":"t"}"#)
                .expect("event should parse");
        assert_eq!(event.seq(), 0);
        assert_eq!(event.event_name(), "dashboard");
    }

    #[test]
    fn fingerprint_tracks_content() {
        assert_eq!(payload_fingerprint(b"abc"), payload_fingerprint(b"abc"));
        assert_ne!(payload_fingerprint(b"abc"), payload_fingerprint(b"abd"));
    }
}
