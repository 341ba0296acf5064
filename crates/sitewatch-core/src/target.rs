//! Target URL validation.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    #[error("invalid URL {0:?}: {1}")]
    Malformed(String, String),
    #[error("unsupported scheme {scheme:?} in {url:?} (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("URL {0:?} has no host")]
    MissingHost(String),
}

/// Check that `raw` is an absolute http(s) URL with a host.
///
/// Localhost, bare IPs and explicit ports are all accepted.
pub fn validate_target(raw: &str) -> Result<Url, UrlError> {
    let parsed =
        Url::parse(raw).map_err(|e| UrlError::Malformed(raw.to_string(), e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(UrlError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: other.to_string(),
            })
        }
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(UrlError::MissingHost(raw.to_string())),
    }
}
