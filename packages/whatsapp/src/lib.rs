#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! WhatsApp Business (Graph API) client and webhook envelope types.
//!
//! Covers exactly the documented webhook contract: parsing the inbound
//! message envelope, resolving and downloading voice-note media, and
//! sending plain text replies. Nothing else of the protocol is modeled.

pub mod webhook;

use thiserror::Error;

/// Graph API version the endpoints are pinned to.
const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// Errors that can occur talking to the messaging provider.
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error or an unusable body.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The client was constructed without credentials.
    #[error("WhatsApp client is disabled: WHATSAPP_ACCESS_TOKEN not set")]
    Disabled,
}

/// Client for the WhatsApp Business Graph API.
///
/// Constructed without credentials the client is *disabled*: every request
/// fails with [`WhatsAppError::Disabled`], but the process keeps running —
/// webhook verification and the read-only dashboard endpoints don't need
/// the token.
pub struct WhatsAppClient {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    client: reqwest::Client,
}

impl WhatsAppClient {
    /// Creates a new client with explicit credentials.
    #[must_use]
    pub fn new(access_token: String, phone_number_id: Option<String>) -> Self {
        Self {
            access_token: Some(access_token),
            phone_number_id,
            client: reqwest::Client::new(),
        }
    }

    /// Creates a client from `WHATSAPP_ACCESS_TOKEN` and
    /// `WHATSAPP_PHONE_NUMBER_ID`, degrading to disabled mode with a
    /// warning when the token is absent.
    #[must_use]
    pub fn from_env() -> Self {
        let access_token = std::env::var("WHATSAPP_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        if access_token.is_none() {
            log::warn!(
                "WHATSAPP_ACCESS_TOKEN not set. Media downloads and outbound \
                 messages are disabled; inbound webhooks will fail processing."
            );
        }

        Self {
            access_token,
            phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID").ok(),
            client: reqwest::Client::new(),
        }
    }

    /// Whether the client has credentials.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.access_token.is_some()
    }

    fn token(&self) -> Result<&str, WhatsAppError> {
        self.access_token.as_deref().ok_or(WhatsAppError::Disabled)
    }

    /// Resolves a media id to its short-lived download URL.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the client is disabled, the request
    /// fails, or the provider response has no URL.
    pub async fn media_url(&self, media_id: &str) -> Result<String, WhatsAppError> {
        let token = self.token()?;

        let resp = self
            .client
            .get(format!("{GRAPH_API_BASE}/{media_id}"))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(WhatsAppError::Provider {
                message: format!("Media lookup failed: HTTP {status}"),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| WhatsAppError::Provider {
                message: format!("Unparseable media lookup response: {e}"),
            })?;

        value
            .get("url")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| WhatsAppError::Provider {
                message: format!("No url in media lookup response for {media_id}"),
            })
    }

    /// Downloads media bytes from a resolved URL.
    ///
    /// The download URL also requires the bearer token — it is not a public
    /// link.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the client is disabled or the request
    /// fails.
    pub async fn download_media(&self, url: &str) -> Result<Vec<u8>, WhatsAppError> {
        let token = self.token()?;

        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WhatsAppError::Provider {
                message: format!("Media download failed: HTTP {status}"),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Resolves a media id and downloads its bytes in one call.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if either step fails.
    pub async fn download_audio(&self, media_id: &str) -> Result<Vec<u8>, WhatsAppError> {
        let url = self.media_url(media_id).await?;
        self.download_media(&url).await
    }

    /// Sends a plain text message to a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError`] if the client is disabled, no phone number
    /// id is configured, or the request fails.
    pub async fn send_text_message(&self, to: &str, body: &str) -> Result<(), WhatsAppError> {
        let token = self.token()?;
        let phone_number_id =
            self.phone_number_id
                .as_deref()
                .ok_or_else(|| WhatsAppError::Provider {
                    message: "WHATSAPP_PHONE_NUMBER_ID not set".to_string(),
                })?;

        let resp = self
            .client
            .post(format!("{GRAPH_API_BASE}/{phone_number_id}/messages"))
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WhatsAppError::Provider {
                message: format!("Message send failed: HTTP {status}"),
            });
        }

        Ok(())
    }
}

/// Checks a webhook verification handshake against the configured token.
///
/// The provider sends `hub.mode=subscribe` with the token it was configured
/// with; anything else (including a missing local token) fails closed.
#[must_use]
pub fn verify_webhook(expected_token: Option<&str>, mode: &str, token: &str) -> bool {
    match expected_token {
        Some(expected) if !expected.is_empty() => mode == "subscribe" && token == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_requires_subscribe_mode_and_matching_token() {
        assert!(verify_webhook(Some("secreto"), "subscribe", "secreto"));
        assert!(!verify_webhook(Some("secreto"), "subscribe", "otro"));
        assert!(!verify_webhook(Some("secreto"), "unsubscribe", "secreto"));
    }

    #[test]
    fn verification_fails_closed_without_a_configured_token() {
        assert!(!verify_webhook(None, "subscribe", "cualquiera"));
        assert!(!verify_webhook(Some(""), "subscribe", ""));
    }

    #[test]
    fn client_without_token_is_disabled() {
        let client = WhatsAppClient {
            access_token: None,
            phone_number_id: None,
            client: reqwest::Client::new(),
        };
        assert!(!client.is_enabled());
        assert!(matches!(client.token(), Err(WhatsAppError::Disabled)));
    }
}
