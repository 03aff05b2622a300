//! WhatsApp Business Cloud API adapter.
//!
//! Sends replies and typing signals via the Graph API and parses Meta
//! webhook payloads. Messages are received via webhook (push-based).

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;

use funil_core::{InboundMessage, Transport, TransportError, TransportResult};

/// Graph API base URL, overridable for tests.
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// Transport implementation backed by the Business Cloud API.
pub struct CloudApiClient {
    access_token: String,
    phone_number_id: String,
    verify_token: String,
    api_base: String,
    client: Client,
    /// Last inbound message id per sender; typing signals attach to it.
    last_message_ids: DashMap<String, String>,
}

impl CloudApiClient {
    /// Create a new client against the production Graph API.
    pub fn new(access_token: String, phone_number_id: String, verify_token: String) -> Self {
        Self::with_api_base(
            access_token,
            phone_number_id,
            verify_token,
            DEFAULT_API_BASE.to_string(),
        )
    }

    /// Create a client against a custom API base (mock servers in tests).
    pub fn with_api_base(
        access_token: String,
        phone_number_id: String,
        verify_token: String,
        api_base: String,
    ) -> Self {
        Self {
            access_token,
            phone_number_id,
            verify_token,
            api_base,
            client: Client::new(),
            last_message_ids: DashMap::new(),
        }
    }

    /// Get the verify token for webhook verification.
    pub fn verify_token(&self) -> &str {
        &self.verify_token
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }

    /// Parse an incoming webhook payload and extract messages.
    ///
    /// Payloads without an `entry` list are not Cloud API webhooks and are
    /// rejected. Status-only notifications (delivery receipts) carry no
    /// `messages` array and yield an empty batch. Non-text messages come
    /// out with an empty body so the funnel's fallback branch still
    /// answers them.
    pub fn parse_webhook(
        &self,
        payload: &serde_json::Value,
    ) -> TransportResult<Vec<InboundMessage>> {
        let mut messages = Vec::new();

        let Some(entries) = payload.get("entry").and_then(|e| e.as_array()) else {
            return Err(TransportError::InvalidMessage(
                "Webhook payload has no entry list".into(),
            ));
        };

        for entry in entries {
            let Some(changes) = entry.get("changes").and_then(|c| c.as_array()) else {
                continue;
            };

            for change in changes {
                let Some(value) = change.get("value") else {
                    continue;
                };

                let Some(msgs) = value.get("messages").and_then(|m| m.as_array()) else {
                    continue;
                };

                for msg in msgs {
                    let Some(from) = msg.get("from").and_then(|f| f.as_str()) else {
                        continue;
                    };

                    let body = msg
                        .get("text")
                        .and_then(|t| t.get("body"))
                        .and_then(|b| b.as_str())
                        .unwrap_or("")
                        .to_string();

                    let timestamp = msg
                        .get("timestamp")
                        .and_then(|t| t.as_str())
                        .and_then(|t| t.parse::<i64>().ok())
                        .map(|ts| ts.saturating_mul(1000)) // Convert to millis
                        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

                    let message_id = msg
                        .get("id")
                        .and_then(|i| i.as_str())
                        .unwrap_or("unknown")
                        .to_string();

                    self.last_message_ids
                        .insert(from.to_string(), message_id.clone());

                    messages.push(InboundMessage {
                        id: message_id,
                        sender: from.to_string(),
                        is_group: from.ends_with("@g.us"),
                        body,
                        timestamp,
                    });
                }
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl Transport for CloudApiClient {
    fn name(&self) -> &'static str {
        "whatsapp-cloud"
    }

    async fn send_typing(&self, to: &str) -> TransportResult<()> {
        // The Cloud API attaches typing indicators to an inbound message id.
        // Without one there is nothing to attach to; skip silently.
        let Some(message_id) = self.last_message_ids.get(to).map(|id| id.value().clone()) else {
            tracing::debug!(to = %to, "No inbound message id for typing signal, skipping");
            return Ok(());
        };

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
            "typing_indicator": {
                "type": "text"
            }
        });

        let resp = self
            .client
            .post(self.messages_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(format!("WhatsApp typing error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed(format!(
                "WhatsApp API error ({status}): {error}"
            )));
        }

        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> TransportResult<()> {
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text
            }
        });

        let resp = self
            .client
            .post(self.messages_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(format!("WhatsApp send error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let error = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(TransportError::Auth(format!(
                    "WhatsApp auth failed ({status}): {error}"
                )));
            }
            return Err(TransportError::SendFailed(format!(
                "WhatsApp API error ({status}): {error}"
            )));
        }

        let result: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TransportError::Internal(format!("Failed to parse response: {e}")))?;

        let message_id = result
            .get("messages")
            .and_then(|m| m.as_array())
            .and_then(|arr| arr.first())
            .and_then(|msg| msg.get("id"))
            .and_then(|id| id.as_str())
            .unwrap_or("unknown");

        tracing::info!(to = %to, message_id = %message_id, "WhatsApp message sent");
        Ok(())
    }

    async fn health_check(&self) -> TransportResult<()> {
        let url = format!("{}/{}", self.api_base, self.phone_number_id);

        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| TransportError::Connection(format!("Health check failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(TransportError::Auth(
                "WhatsApp authentication failed".to_string(),
            ))
        } else {
            Err(TransportError::Connection(format!(
                "WhatsApp health check returned {status}"
            )))
        }
    }
}
