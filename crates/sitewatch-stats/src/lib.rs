//! sitewatch-stats: read-side projection over the registry and history.
//!
//! ```text
//! StatsEngine::compute(job_id | pid)
//!   ├── JobRegistry::resolve + get   (may be gone after stop)
//!   ├── HistoryStore::read_all       (durable after stop)
//!   └── summarize() → JobStats       (pure, recomputed on every query)
//! ```
//!
//! Nothing here is persisted and nothing here fails: a job with no
//! readable history yields a partial `JobStats` flagged `empty_history`.

pub mod engine;

pub use engine::{summarize, JobStats, StatsEngine};
