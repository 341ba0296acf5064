//! sitewatch-supervisor: job lifecycle.
//!
//! ```text
//! Supervisor::start ──spawn──▶ sitewatch watch <url> --job-id <id>   (detached)
//!        │                             │
//!        ▼                             ▼
//!   JobRegistry ◀──reload config── RunLoop ──append──▶ HistoryStore
//!        ▲                             │
//! Supervisor::stop ──SIGTERM/SIGKILL───┘
//! ```
//!
//! Each job is its own OS process. Stopping one is done with signals, not
//! in-process handles; the foreground `watch` uses a `watch` channel fed
//! by Ctrl-C instead.

pub mod error;
pub mod launcher;
pub mod run_loop;
pub mod supervisor;

pub use error::{SupervisorError, SupervisorResult};
pub use launcher::{DetachedLauncher, LaunchSpec, ProcessLauncher};
pub use run_loop::{LoopEvent, RunLoop, RunSummary};
pub use supervisor::{JobPhase, Supervisor, STOP_GRACE};
