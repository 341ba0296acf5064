//! JobRegistry: one JSON record file per background job.
//!
//! Records live at `<dir>/<prefix>_<job_id>.pid`. Listing never fails on a
//! bad record: files that cannot be parsed (a crash mid-write, manual
//! edits) are skipped and logged at debug level.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use sitewatch_core::{ConfigPatch, JobConfig, MonitorConfig};

use crate::error::{io_at, StateError, StateResult};
use crate::fsutil::atomic_write;
use crate::history::history_path;
use crate::process::probe_liveness;
use crate::types::{JobRecord, Liveness};

/// Longest sanitized URL prefix kept in a job id.
const MAX_ID_PREFIX: usize = 50;

const RECORD_EXT: &str = "pid";

/// Generate a filesystem-safe job id from a target URL plus a random suffix.
///
/// `https://example.com/a` becomes something like `https_example_com_a_1f2e3d4c`.
pub fn new_job_id(url: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", sanitize(url), &suffix[..8])
}

fn sanitize(url: &str) -> String {
    url.replace("://", "_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_ID_PREFIX)
        .collect()
}

/// File-backed registry of background jobs.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    dir: PathBuf,
    prefix: String,
}

impl JobRegistry {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.data_dir, &config.pid_file_prefix)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> StateResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))
    }

    /// Path of the record for `job_id`. Derived, so it exists only once registered.
    pub fn record_path(&self, job_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{RECORD_EXT}", self.prefix, job_id))
    }

    /// Build and persist a record for a freshly started job.
    pub fn create(
        &self,
        url: &str,
        process_id: u32,
        config: JobConfig,
    ) -> StateResult<JobRecord> {
        let job_id = new_job_id(url);
        let record = self.new_record(&job_id, url, process_id, config);
        self.register(&record)?;
        Ok(record)
    }

    /// Build an unpersisted record for a job id allocated by the caller.
    pub fn new_record(
        &self,
        job_id: &str,
        url: &str,
        process_id: u32,
        config: JobConfig,
    ) -> JobRecord {
        JobRecord {
            job_id: job_id.to_string(),
            url: url.to_string(),
            process_id,
            log_path: history_path(&self.dir, job_id),
            registry_path: self.record_path(job_id),
            started_at: Utc::now(),
            config,
            liveness: Liveness::Unknown,
        }
    }

    /// Write (or overwrite) a record atomically.
    pub fn register(&self, record: &JobRecord) -> StateResult<()> {
        self.ensure_dir()?;
        let path = self.record_path(&record.job_id);
        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| StateError::Serialize(e.to_string()))?;
        atomic_write(&path, &body).map_err(io_at(&path))?;
        debug!(job_id = %record.job_id, pid = record.process_id, path = ?path, "job registered");
        Ok(())
    }

    /// Read one record. Missing and unparsable records are both `None`.
    pub fn get(&self, job_id: &str) -> StateResult<Option<JobRecord>> {
        read_record(&self.record_path(job_id))
    }

    /// All parsable records, oldest first, with liveness filled in.
    pub fn list(&self) -> StateResult<Vec<JobRecord>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_at(&self.dir)(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_at(&self.dir))?;
            let path = entry.path();
            if !self.is_record_file(&path) {
                continue;
            }
            // A record that vanished or went bad between read_dir and here is skipped.
            if let Ok(Some(mut record)) = read_record(&path) {
                record.liveness = probe_liveness(record.process_id);
                records.push(record);
            }
        }

        records.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(records)
    }

    /// Map a job id or a process id to a job id.
    ///
    /// A numeric identifier matching a registered pid resolves to that
    /// job's id; anything else is returned unchanged.
    pub fn resolve(&self, identifier: &str) -> String {
        if let Ok(pid) = identifier.parse::<u32>() {
            match self.list() {
                Ok(records) => {
                    if let Some(record) = records.into_iter().find(|r| r.process_id == pid) {
                        return record.job_id;
                    }
                }
                Err(e) => debug!(error = %e, "registry scan failed during resolve"),
            }
        }
        identifier.to_string()
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&self, job_id: &str) -> StateResult<bool> {
        let path = self.record_path(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(%job_id, "job record deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_at(&path)(e)),
        }
    }

    /// Merge `patch` into a job's persisted config.
    pub fn update(&self, job_id: &str, patch: &ConfigPatch) -> StateResult<JobRecord> {
        let mut record = self
            .get(job_id)?
            .ok_or_else(|| StateError::NotFound(job_id.to_string()))?;
        patch.apply_to(&mut record.config);
        self.register(&record)?;
        Ok(record)
    }

    /// Current persisted config for a job, if it has a readable record.
    pub fn load_job_config(&self, job_id: &str) -> Option<JobConfig> {
        match self.get(job_id) {
            Ok(record) => record.map(|r| r.config),
            Err(e) => {
                debug!(%job_id, error = %e, "failed to read job config");
                None
            }
        }
    }

    /// Delete records whose process is known to be gone.
    ///
    /// Records with [`Liveness::Unknown`] are kept.
    pub fn prune_dead(&self) -> StateResult<Vec<String>> {
        let mut removed = Vec::new();
        for record in self.list()? {
            if record.liveness == Liveness::Dead && self.delete(&record.job_id)? {
                removed.push(record.job_id);
            }
        }
        Ok(removed)
    }

    fn is_record_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|rest| rest.ends_with(&format!(".{RECORD_EXT}")))
    }
}

fn read_record(path: &Path) -> StateResult<Option<JobRecord>> {
    let body = match std::fs::read(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_at(path)(e)),
    };
    match serde_json::from_slice(&body) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            debug!(path = ?path, error = %e, "skipping unparsable job record");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JobConfig {
        JobConfig {
            interval: 60,
            timeout: 10,
            webhook_url: Some("https://hooks.example.com/alert".to_string()),
            webhook_payload: None,
            verify_ssl: true,
        }
    }

    fn test_registry() -> (tempfile::TempDir, JobRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new(dir.path(), "monitor-job");
        (dir, registry)
    }

    // ── Job ids ────────────────────────────────────────────────────

    #[test]
    fn job_id_is_sanitized_and_suffixed() {
        let id = new_job_id("https://example.com/a?b=c");
        let (prefix, suffix) = id.rsplit_once('_').unwrap();
        assert_eq!(prefix, "https_example_com_a_b_c");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn job_id_prefix_is_bounded() {
        let long = format!("https://example.com/{}", "x".repeat(200));
        let id = new_job_id(&long);
        assert_eq!(id.len(), MAX_ID_PREFIX + 1 + 8);
    }

    #[test]
    fn job_ids_differ_for_same_url() {
        assert_ne!(new_job_id("http://a"), new_job_id("http://a"));
    }

    // ── CRUD ───────────────────────────────────────────────────────

    #[test]
    fn create_then_get() {
        let (_dir, registry) = test_registry();
        let record = registry
            .create("https://example.com", 4242, test_config())
            .unwrap();

        assert!(record.registry_path.exists());
        assert_eq!(record.registry_path, registry.record_path(&record.job_id));
        assert!(record.log_path.ends_with(format!("{}.log", record.job_id)));

        let back = registry.get(&record.job_id).unwrap().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn resolve_by_job_id_and_pid() {
        let (_dir, registry) = test_registry();
        let record = registry
            .create("https://example.com", 4242, test_config())
            .unwrap();

        assert_eq!(registry.resolve(&record.job_id), record.job_id);
        assert_eq!(registry.resolve("4242"), record.job_id);
        assert_eq!(registry.resolve("9999"), "9999");
        assert_eq!(registry.resolve("unknown-job"), "unknown-job");
    }

    #[test]
    fn list_skips_corrupt_and_foreign_files() {
        let (dir, registry) = test_registry();
        registry.create("http://a.example", 1, test_config()).unwrap();
        registry.create("http://b.example", 2, test_config()).unwrap();

        std::fs::write(dir.path().join("monitor-job_broken.pid"), "{\"job_id\": ").unwrap();
        std::fs::write(dir.path().join("other_thing.pid"), "{}").unwrap();
        std::fs::write(dir.path().join("monitor-job_x.log"), "{}").unwrap();

        let records = registry.list().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn list_on_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JobRegistry::new(dir.path().join("absent"), "monitor-job");
        assert!(registry.list().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn list_reports_liveness() {
        let (_dir, registry) = test_registry();
        let me = registry
            .create("http://alive.example", std::process::id(), test_config())
            .unwrap();
        let ghost = registry
            .create("http://dead.example", i32::MAX as u32, test_config())
            .unwrap();

        let records = registry.list().unwrap();
        let find = |id: &str| records.iter().find(|r| r.job_id == id).unwrap().liveness;
        assert_eq!(find(&me.job_id), Liveness::Alive);
        assert_eq!(find(&ghost.job_id), Liveness::Dead);
    }

    #[test]
    fn get_corrupt_record_is_none() {
        let (dir, registry) = test_registry();
        std::fs::write(dir.path().join("monitor-job_bad.pid"), "not json").unwrap();
        assert!(registry.get("bad").unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, registry) = test_registry();
        let record = registry.create("http://a.example", 1, test_config()).unwrap();

        assert!(registry.delete(&record.job_id).unwrap());
        assert!(!registry.delete(&record.job_id).unwrap());
        assert!(registry.get(&record.job_id).unwrap().is_none());
    }

    // ── Updates ────────────────────────────────────────────────────

    #[test]
    fn update_interval_keeps_other_fields() {
        let (_dir, registry) = test_registry();
        let record = registry.create("http://a.example", 1, test_config()).unwrap();

        let patch = ConfigPatch {
            interval: Some(300),
            ..Default::default()
        };
        registry.update(&record.job_id, &patch).unwrap();

        let config = registry.load_job_config(&record.job_id).unwrap();
        assert_eq!(config.interval, 300);
        assert_eq!(config.timeout, 10);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/alert")
        );
        assert!(config.verify_ssl);
    }

    #[test]
    fn update_unknown_job_is_not_found() {
        let (_dir, registry) = test_registry();
        let err = registry
            .update("nope", &ConfigPatch::default())
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound(id) if id == "nope"));
    }

    #[cfg(unix)]
    #[test]
    fn prune_removes_only_dead_jobs() {
        let (_dir, registry) = test_registry();
        let me = registry
            .create("http://alive.example", std::process::id(), test_config())
            .unwrap();
        let ghost = registry
            .create("http://dead.example", i32::MAX as u32, test_config())
            .unwrap();

        let removed = registry.prune_dead().unwrap();
        assert_eq!(removed, vec![ghost.job_id.clone()]);
        assert!(registry.get(&me.job_id).unwrap().is_some());
        assert!(registry.get(&ghost.job_id).unwrap().is_none());
    }
}
