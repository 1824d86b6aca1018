//! Notifications pushed from the relay to listening clients.

use serde::{Deserialize, Serialize};

/// Severity of a system status notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Something that happened on air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A listener-style comment.
    VirtualComment {
        /// Comment text.
        text: String,
    },

    /// Script the host is about to speak.
    HostSpeech {
        /// Text of the speech.
        script_text: String,
    },

    /// The generated genre changed.
    GenreChange {
        /// Genre now being generated.
        new_genre_name: String,

        /// Why it changed, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Relay health or operator message.
    SystemStatus {
        /// How serious the status is.
        severity: Severity,

        /// Human readable message.
        message: String,
    },
}

impl Notification {
    /// Returns the wire name of this notification kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VirtualComment { .. } => "virtual_comment",
            Self::HostSpeech { .. } => "host_speech",
            Self::GenreChange { .. } => "genre_change",
            Self::SystemStatus { .. } => "system_status",
        }
    }
}

/// A timestamped notification as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateMessage {
    /// Wall-clock time of publication, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,

    /// The notification payload.
    #[serde(flatten)]
    pub notification: Notification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_message_is_flat() {
        let msg = UpdateMessage {
            timestamp_ms: 1700,
            notification: Notification::GenreChange {
                new_genre_name: "jazz".into(),
                reason: None,
            },
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "genre_change");
        assert_eq!(value["new_genre_name"], "jazz");
        assert_eq!(value["timestamp_ms"], 1700);
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn test_notification_from_json() {
        let json = r#"{"type":"system_status","severity":"warning","message":"producer down"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();

        assert_eq!(n.kind(), "system_status");
        assert!(matches!(
            n,
            Notification::SystemStatus {
                severity: Severity::Warning,
                ..
            }
        ));
    }
}
