//! HTTP availability probe.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use sitewatch_core::{validate_target, MonitorConfig, ProbeOutcome};

/// Performs a single availability check.
pub trait Prober {
    fn probe(
        &self,
        url: &str,
        timeout: Duration,
        verify_ssl: bool,
    ) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probe that issues a `GET` and compares the final status code against an
/// allow-list. Redirects are followed.
#[derive(Debug, Clone)]
pub struct HttpProber {
    user_agent: String,
    success_codes: Vec<u16>,
}

impl HttpProber {
    pub fn new(user_agent: impl Into<String>, success_codes: Vec<u16>) -> Self {
        Self {
            user_agent: user_agent.into(),
            success_codes,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.user_agent, config.success_status_codes.clone())
    }
}

impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration, verify_ssl: bool) -> ProbeOutcome {
        if validate_target(url).is_err() {
            return ProbeOutcome::failed(url, "Invalid URL");
        }

        let client = match reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(self.user_agent.as_str())
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
        {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::failed(url, format!("Client error: {e}")),
        };

        let started = Instant::now();
        let result = client.get(url).send().await;
        let response_time = round_millis(started.elapsed());

        match result {
            Ok(response) => {
                let status = response.status();
                let code = status.as_u16();
                let error = if status.is_client_error() || status.is_server_error() {
                    Some(format!(
                        "HTTP Error {code}: {}",
                        status.canonical_reason().unwrap_or("Unknown")
                    ))
                } else {
                    None
                };
                debug!(%url, status = code, response_time, "probe completed");
                ProbeOutcome {
                    url: url.to_string(),
                    status_code: Some(code),
                    success: self.success_codes.contains(&code),
                    response_time,
                    error,
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timed out".to_string()
                } else if e.is_connect() {
                    format!("Connection error: {e}")
                } else {
                    format!("Request error: {e}")
                };
                debug!(%url, error = %e, "probe failed");
                ProbeOutcome {
                    url: url.to_string(),
                    status_code: e.status().map(|s| s.as_u16()),
                    success: false,
                    response_time,
                    error: Some(error),
                }
            }
        }
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}
