use serde_json::Value;

/// Placeholder when a message carries no sender identifier.
pub const SENDER_UNKNOWN: &str = "Unknown";
/// Placeholder when a message carries no text body (media, location, ...).
pub const TEXT_UNSUPPORTED: &str = "Unsupported type";
/// Placeholder when a message declares no type.
pub const KIND_UNKNOWN: &str = "unknown";

/// One inbound message, flattened from the webhook payload.
///
/// Construction is total: a missing or empty optional field degrades to its
/// sentinel value, it never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
    /// Message kind as declared by the platform ("text", "image", ...).
    pub kind: String,
    pub id: String,
    /// Complete original message object, serialized for forensic replay.
    pub raw: String,
}

impl InboundMessage {
    pub fn from_raw(message: &Value) -> Self {
        Self {
            sender: non_empty_str(message.get("from"))
                .unwrap_or(SENDER_UNKNOWN)
                .to_string(),
            text: non_empty_str(message.pointer("/text/body"))
                .unwrap_or(TEXT_UNSUPPORTED)
                .to_string(),
            kind: non_empty_str(message.get("type"))
                .unwrap_or(KIND_UNKNOWN)
                .to_string(),
            id: message
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            raw: message.to_string(),
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
