use crate::types::InboundMessage;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct NotificationPayload {
    #[serde(default)]
    entry: Vec<NotificationEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationEntry {
    #[serde(default)]
    changes: Vec<NotificationChange>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationChange {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

/// Flatten a webhook notification body into its messages.
///
/// Absent `entry` / `changes` / `value` / `messages` keys are treated as
/// empty collections; only a malformed top-level shape is an error.
/// Messages are yielded in payload order: entry, then change, then message.
pub fn parse_notification(body: &[u8]) -> Result<Vec<InboundMessage>, serde_json::Error> {
    let payload: NotificationPayload = serde_json::from_slice(body)?;
    let mut messages = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            for message in change.value.messages {
                messages.push(InboundMessage::from_raw(&message));
            }
        }
    }
    Ok(messages)
}
