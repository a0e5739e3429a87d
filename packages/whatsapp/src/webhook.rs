//! Inbound webhook envelope types.
//!
//! The provider wraps each event in `entry[].changes[].value`; only the
//! `messages` array matters here. Unknown fields are ignored so provider
//! envelope additions never break parsing.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Top-level webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Event entries; in practice one per delivery.
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// One webhook entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    /// Changes carried by this entry.
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// One change inside an entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    /// The change payload.
    pub value: WebhookValue,
}

/// The payload of a change: inbound messages, if any.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookValue {
    /// Inbound messages in this change.
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

/// One inbound message.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Provider message id.
    pub id: Option<String>,
    /// Sender phone number.
    pub from: String,
    /// Unix timestamp (seconds) as a string, per the provider contract.
    pub timestamp: Option<String>,
    /// Message type: `audio`, `text`, `image`, ...
    #[serde(rename = "type")]
    pub message_type: String,
    /// Audio attachment, present when `message_type` is `audio`.
    pub audio: Option<AudioAttachment>,
}

/// Reference to an audio attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioAttachment {
    /// Media id, resolvable via the Graph API.
    pub id: String,
}

impl WebhookPayload {
    /// Returns the first inbound message, the only one the pipeline
    /// processes per delivery (matching the provider's one-message
    /// envelopes).
    #[must_use]
    pub fn first_message(&self) -> Option<&InboundMessage> {
        self.entry
            .first()
            .and_then(|entry| entry.changes.first())
            .and_then(|change| change.value.messages.first())
    }
}

impl InboundMessage {
    /// Whether this is a voice/audio message.
    #[must_use]
    pub fn is_audio(&self) -> bool {
        self.message_type == "audio" && self.audio.is_some()
    }

    /// Parses the provider's string epoch timestamp, falling back to the
    /// current time when absent or malformed.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_envelope() -> serde_json::Value {
        serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1234567890",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{
                            "id": "wamid.HBgLNTczMDAxMjM0NTY3",
                            "from": "573001234567",
                            "timestamp": "1722470400",
                            "type": "audio",
                            "audio": { "id": "media-abc", "mime_type": "audio/ogg" }
                        }]
                    }
                }]
            }]
        })
    }

    #[test]
    fn parses_audio_envelope() {
        let payload: WebhookPayload = serde_json::from_value(audio_envelope()).unwrap();

        let message = payload.first_message().unwrap();
        assert!(message.is_audio());
        assert_eq!(message.from, "573001234567");
        assert_eq!(message.audio.as_ref().unwrap().id, "media-abc");
        assert_eq!(
            message.received_at(),
            DateTime::<Utc>::from_timestamp(1_722_470_400, 0).unwrap()
        );
    }

    #[test]
    fn image_message_is_not_audio() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "573001234567",
                            "type": "image",
                            "image": { "id": "media-img" }
                        }]
                    }
                }]
            }]
        }))
        .unwrap();

        let message = payload.first_message().unwrap();
        assert!(!message.is_audio());
    }

    #[test]
    fn empty_envelope_has_no_message() {
        let payload: WebhookPayload =
            serde_json::from_value(serde_json::json!({ "entry": [] })).unwrap();
        assert!(payload.first_message().is_none());

        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [] } }] }]
        }))
        .unwrap();
        assert!(payload.first_message().is_none());
    }

    #[test]
    fn malformed_timestamp_falls_back_to_now() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "573001234567",
                            "timestamp": "not-a-number",
                            "type": "audio",
                            "audio": { "id": "media-abc" }
                        }]
                    }
                }]
            }]
        }))
        .unwrap();

        let message = payload.first_message().unwrap();
        let parsed = message.received_at();
        assert!((Utc::now() - parsed).num_seconds().abs() < 5);
    }
}
