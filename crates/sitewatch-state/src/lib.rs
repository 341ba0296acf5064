//! sitewatch-state: file-backed state for sitewatch jobs.
//!
//! Two stores share one data directory:
//!
//! ```text
//! <data_dir>/
//!   <prefix>_<job_id>.pid     JobRegistry  (pretty JSON, one record per job)
//!   <job_id>.log              HistoryStore (JSON lines, one CheckEntry per probe)
//!   <job_id>.<YYYY-MM-DD>     rotated history
//! ```
//!
//! Every job process writes only its own files. The one cross-process
//! writer is `JobRegistry::update`, which goes through [`atomic_write`]
//! so the running job never reads a torn record. Readers treat anything
//! unparsable as absent.

pub mod error;
pub mod fsutil;
pub mod history;
pub mod process;
pub mod registry;
pub mod types;

pub use error::{StateError, StateResult};
pub use fsutil::atomic_write;
pub use history::HistoryStore;
pub use process::{probe_liveness, send_signal, Signal};
pub use registry::{new_job_id, JobRegistry};
pub use types::*;
