//! Operator alerts for exhausted fallback chains.
//!
//! Alerting is a side channel: a failed delivery is logged and otherwise ignored, it
//! never changes the outcome of the request that triggered it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::routing::ExhaustedError;

pub(crate) const EXHAUSTED_TITLE: &str = "Open Fall Triggered";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Alert {
    pub title: String,
    pub description: String,
    pub details: serde_json::Value,
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    /// Returns whether the alert was delivered.
    async fn notify(&self, alert: &Alert) -> bool;
}

/// Drops every alert
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct NullSink;

#[async_trait]
impl AlertSink for NullSink {
    async fn notify(&self, alert: &Alert) -> bool {
        tracing::debug!(title = %alert.title, "no alert sink configured, dropping alert");
        false
    }
}

/// Posts alerts to a Discord channel webhook
pub(crate) struct DiscordWebhook {
    url: String,
    client: Client,
}

impl DiscordWebhook {
    pub(crate) fn new(url: &str) -> DiscordWebhook {
        DiscordWebhook {
            url: url.trim().to_string(),
            client: Client::new(),
        }
    }

    fn content(alert: &Alert) -> String {
        let details = serde_json::to_string_pretty(&alert.details)
            .unwrap_or_else(|_| alert.details.to_string());

        format!(
            "**{}**\n{}\n```json\n{}\n```",
            alert.title, alert.description, details
        )
    }
}

#[derive(Serialize)]
struct WebhookMessage {
    content: String,
}

#[async_trait]
impl AlertSink for DiscordWebhook {
    async fn notify(&self, alert: &Alert) -> bool {
        if self.url.is_empty() {
            crate::warn!("alert webhook URL is empty, dropping alert \"{}\"", alert.title);
            return false;
        }

        let message = WebhookMessage {
            content: DiscordWebhook::content(alert),
        };

        let resp = self
            .client
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&message)
            .send()
            .await;

        match resp {
            Ok(resp) if matches!(resp.status(), StatusCode::OK | StatusCode::NO_CONTENT) => {
                tracing::info!(title = %alert.title, "alert delivered");
                true
            }
            Ok(resp) => {
                crate::warn!("alert webhook responded with HTTP {}", resp.status());
                false
            }
            Err(err) => {
                crate::warn!("failed to deliver alert: {}", err);
                false
            }
        }
    }
}

/// Webhook sink when a URL is configured, otherwise [`NullSink`]
pub(crate) fn sink_for(webhook: Option<&str>) -> Arc<dyn AlertSink> {
    match webhook {
        Some(url) => Arc::new(DiscordWebhook::new(url)),
        None => Arc::new(NullSink),
    }
}

/// Alert describing an exhausted chain. `call_errors` are the failed provider calls
/// that led there, if any.
pub(crate) fn exhaustion_alert(err: &ExhaustedError, call_errors: &[String]) -> Alert {
    let role = err.role.as_deref().unwrap_or("default");

    let attempted: Vec<String> = err.attempted().map(|c| c.to_string()).collect();

    Alert {
        title: EXHAUSTED_TITLE.to_string(),
        description: format!("All {} role providers failed during request.", role),
        details: serde_json::json!({
            "role": role,
            "attempted": attempted,
            "call_errors": call_errors,
            "reason": err.to_string(),
        }),
    }
}

pub(crate) async fn notify_exhausted(
    sink: &dyn AlertSink,
    err: &ExhaustedError,
    call_errors: &[String],
) -> bool {
    sink.notify(&exhaustion_alert(err, call_errors)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::catalog::Candidate;
    use crate::routing::probe::Availability;
    use crate::routing::Attempt;

    fn exhausted() -> ExhaustedError {
        ExhaustedError {
            role: Some("ace".to_string()),
            attempts: vec![
                Attempt {
                    candidate: Candidate::new("anthropic", "claude-x"),
                    availability: Availability::Disabled,
                },
                Attempt {
                    candidate: Candidate::new("ollama", "qwen"),
                    availability: Availability::Unreachable("down".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_exhaustion_alert() {
        let alert = exhaustion_alert(&exhausted(), &[]);

        assert_eq!(alert.title, "Open Fall Triggered");
        assert_eq!(alert.description, "All ace role providers failed during request.");
        assert_eq!(
            alert.details["attempted"],
            serde_json::json!(["anthropic/claude-x", "ollama/qwen"])
        );
    }

    #[test]
    fn test_webhook_content() {
        let alert = Alert {
            title: "Title".to_string(),
            description: "Body".to_string(),
            details: serde_json::json!({ "role": "ace" }),
        };

        assert_eq!(
            DiscordWebhook::content(&alert),
            "**Title**\nBody\n```json\n{\n  \"role\": \"ace\"\n}\n```"
        );
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::Regex("Open Fall Triggered".to_string()))
            .with_status(204)
            .create_async()
            .await;

        let sink = DiscordWebhook::new(&format!("{}/hook", server.url()));

        assert!(notify_exhausted(&sink, &exhausted(), &[]).await);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_rejection_is_swallowed() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let sink = DiscordWebhook::new(&format!("{}/hook", server.url()));

        assert!(!notify_exhausted(&sink, &exhausted(), &[]).await);
    }

    #[tokio::test]
    async fn test_empty_url_does_no_io() {
        assert!(!DiscordWebhook::new("  ").notify(&exhaustion_alert(&exhausted(), &[])).await);
        assert!(!NullSink.notify(&exhaustion_alert(&exhausted(), &[])).await);
    }
}
