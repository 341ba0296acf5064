//! sitewatch-health: the network side of a check.
//!
//! Provides the HTTP probe used by every check and the webhook fired when
//! a check fails. Both are expressed as traits so the run-loop can be
//! driven by scripted implementations in tests.
//!
//! # Architecture
//!
//! ```text
//! run-loop
//!   ├── Prober::probe(url, timeout, verify_ssl) → ProbeOutcome
//!   │     └── HttpProber (reqwest GET, success = status in allow-list)
//!   └── Notifier::notify(outcome, webhook_url, template) → WebhookOutcome
//!         └── WebhookNotifier (reqwest POST, JSON body)
//! ```
//!
//! Neither side ever returns an error: network failures are data.

pub mod probe;
pub mod webhook;

pub use probe::{HttpProber, Prober};
pub use webhook::{render_payload, Notifier, WebhookNotifier, WebhookOutcome};
