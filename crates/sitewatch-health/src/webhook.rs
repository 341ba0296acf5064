//! Failure notifications over a webhook.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client};
use serde::Serialize;
use tracing::{debug, warn};

use sitewatch_core::ProbeOutcome;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one delivery attempt. Delivery is fire-and-forget: a failure
/// is reported, never retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl WebhookOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Delivers a notification about a failed check.
pub trait Notifier {
    fn notify(
        &self,
        outcome: &ProbeOutcome,
        webhook_url: &str,
        template: Option<&str>,
    ) -> impl Future<Output = WebhookOutcome> + Send;
}

/// Posts a JSON body to the configured webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        outcome: &ProbeOutcome,
        webhook_url: &str,
        template: Option<&str>,
    ) -> WebhookOutcome {
        let body = render_payload(template, outcome, &Utc::now().to_rfc3339());

        let response = self
            .client
            .post(webhook_url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!(%webhook_url, status = %resp.status(), "webhook delivered");
                WebhookOutcome::ok()
            }
            Ok(resp) => {
                let status = resp.status();
                warn!(%webhook_url, %status, "webhook rejected");
                WebhookOutcome::failed(format!("Webhook returned non-success status: {status}"))
            }
            Err(e) => {
                warn!(%webhook_url, error = %e, "webhook delivery failed");
                WebhookOutcome::failed(format!("Webhook request failed: {e}"))
            }
        }
    }
}

/// Build the webhook body for a failed check.
///
/// A template may use `{url}`, `{status_code}`, `{error}`, `{timestamp}` and
/// `{response_time}`. String values are JSON-escaped so a template such as
/// `{"error":"{error}"}` stays valid JSON. Without a template a default
/// JSON object is produced.
pub fn render_payload(template: Option<&str>, outcome: &ProbeOutcome, timestamp: &str) -> String {
    match template {
        Some(template) => {
            let status = outcome
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "null".to_string());
            template
                .replace("{url}", &json_escape(&outcome.url))
                .replace("{status_code}", &status)
                .replace("{error}", &json_escape(outcome.error.as_deref().unwrap_or("")))
                .replace("{timestamp}", &json_escape(timestamp))
                .replace("{response_time}", &outcome.response_time.to_string())
        }
        None => serde_json::json!({
            "event": "website_down",
            "url": outcome.url,
            "status_code": outcome.status_code,
            "error": outcome.error,
            "response_time": outcome.response_time,
            "timestamp": timestamp,
        })
        .to_string(),
    }
}

/// Escape `s` for embedding inside a JSON string literal.
fn json_escape(s: &str) -> String {
    let quoted = serde_json::Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
