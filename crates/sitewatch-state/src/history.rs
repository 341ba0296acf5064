//! HistoryStore: append-only JSON-lines log of check results per job.
//!
//! Each probe appends exactly one self-contained line, so an interrupted
//! write can damage at most the last line. Readers skip anything that does
//! not parse. Rotation and trimming are plain file operations:
//!
//! - rotation copies an aged log to `<job_id>.<YYYY-MM-DD>` and truncates
//!   the original;
//! - trimming rewrites the log in place with only the newest N lines.
//!
//! Both keep the active log's inode, since a detached job appends its own
//! stdout and stderr to the same file. Lines are handled as bytes: stray
//! child output need not be UTF-8.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use sitewatch_core::MonitorConfig;

use crate::error::{io_at, StateError, StateResult};
use crate::types::CheckEntry;

/// Path of the active history log for `job_id` under `dir`.
pub fn history_path(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("{job_id}.log"))
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    /// 0 keeps everything.
    max_entries: usize,
    rotate_after: Option<Duration>,
}

impl HistoryStore {
    /// A store with neither trimming nor rotation.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_entries: 0,
            rotate_after: None,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        let store = Self::new(&config.data_dir).with_max_entries(config.max_log_entries);
        if config.log_rotate_interval > 0 {
            store.with_rotation(Duration::from_secs(config.log_rotate_interval))
        } else {
            store
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_rotation(mut self, after: Duration) -> Self {
        self.rotate_after = Some(after);
        self
    }

    pub fn log_path(&self, job_id: &str) -> PathBuf {
        history_path(&self.dir, job_id)
    }

    /// Append one entry, rotating before and trimming after as configured.
    pub fn append(&self, job_id: &str, entry: &CheckEntry) -> StateResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(io_at(&self.dir))?;
        let path = self.log_path(job_id);

        if let Some(max_age) = self.rotate_after {
            rotate_if_stale(&path, max_age)?;
        }

        let mut line =
            serde_json::to_string(entry).map_err(|e| StateError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_at(&path))?;
        // A previous crash may have left a partial line; start a fresh one.
        if ends_mid_line(&mut file).map_err(io_at(&path))? {
            line.insert(0, '\n');
        }
        // Single write per entry keeps each line whole under O_APPEND.
        file.write_all(line.as_bytes()).map_err(io_at(&path))?;
        drop(file);

        if self.max_entries > 0 {
            trim(&path, self.max_entries)?;
        }
        Ok(())
    }

    /// The last `lines` raw lines of a job's log, or `None` if it has no log.
    pub fn tail(&self, job_id: &str, lines: usize) -> StateResult<Option<String>> {
        let path = self.log_path(job_id);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_at(&path)(e)),
        };

        let all: Vec<&[u8]> = content.split_inclusive(|b| *b == b'\n').collect();
        let start = all.len().saturating_sub(lines);
        let mut out = String::new();
        for &line in &all[start..] {
            let line = line.strip_suffix(b"\n").unwrap_or(line);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            out.push_str(&String::from_utf8_lossy(line));
            out.push('\n');
        }
        Ok(Some(out))
    }

    /// Every parsable entry in the active log, in file order.
    ///
    /// Never fails: a missing or unreadable log yields an empty history,
    /// and blank or corrupt lines are skipped.
    pub fn read_all(&self, job_id: &str) -> Vec<CheckEntry> {
        let path = self.log_path(job_id);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = ?path, error = %e, "history log unreadable");
                }
                return Vec::new();
            }
        };

        non_empty_lines(&content)
            .filter_map(|line| match serde_json::from_slice::<CheckEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(path = ?path, error = %e, "skipping unparsable history line");
                    None
                }
            })
            .collect()
    }
}

fn non_empty_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split(|b| *b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
}

fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Archive `path` to its dated sibling when it is older than `max_age`.
///
/// Copies then truncates, so open append handles on `path` follow the
/// active log. Returns the archive path, if rotation happened. An existing
/// dated file is never overwritten; in that case writes continue on the
/// current log.
fn rotate_if_stale(path: &Path, max_age: Duration) -> StateResult<Option<PathBuf>> {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_at(path)(e)),
    };

    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    if age <= max_age {
        return Ok(None);
    }

    let rotated = rotated_path(path, modified);
    if rotated.exists() {
        debug!(path = ?rotated, "rotation target exists, keeping current log");
        return Ok(None);
    }
    std::fs::copy(path, &rotated).map_err(io_at(&rotated))?;
    File::open(&rotated)
        .and_then(|archive| archive.sync_all())
        .map_err(io_at(&rotated))?;
    File::options()
        .write(true)
        .open(path)
        .and_then(|active| active.set_len(0))
        .map_err(io_at(path))?;
    info!(from = ?path, to = ?rotated, "history log rotated");
    Ok(Some(rotated))
}

/// `<dir>/<job_id>.<YYYY-MM-DD>` using the local date of `modified`.
pub fn rotated_path(path: &Path, modified: SystemTime) -> PathBuf {
    let date = DateTime::<Local>::from(modified).format("%Y-%m-%d");
    path.with_extension(date.to_string())
}

/// Keep only the newest `keep` non-empty lines.
///
/// Rewrites in place rather than via rename so that a detached job whose
/// stdout is redirected to this file keeps writing to the active log.
fn trim(path: &Path, keep: usize) -> StateResult<()> {
    let content = std::fs::read(path).map_err(io_at(path))?;
    let lines: Vec<&[u8]> = non_empty_lines(&content).collect();
    if lines.len() <= keep {
        return Ok(());
    }

    let mut kept = lines[lines.len() - keep..].join(&b'\n');
    kept.push(b'\n');
    std::fs::write(path, kept).map_err(io_at(path))?;
    debug!(path = ?path, dropped = lines.len() - keep, "history log trimmed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ts: f64, success: bool) -> CheckEntry {
        CheckEntry {
            timestamp: ts,
            iso_time: None,
            url: "https://example.com".to_string(),
            status_code: if success { Some(200) } else { Some(503) },
            success,
            response_time: 0.05,
            error: None,
            interval: Some(60),
        }
    }

    #[test]
    fn append_then_read_all_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());

        for i in 0..5 {
            store.append("job", &entry(i as f64, i % 2 == 0)).unwrap();
        }

        let entries = store.read_all("job");
        let stamps: Vec<f64> = entries.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(entries[0].success);
        assert!(!entries[1].success);
    }

    #[test]
    fn append_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/data"));
        store.append("job", &entry(1.0, true)).unwrap();
        assert_eq!(store.read_all("job").len(), 1);
    }

    #[test]
    fn trim_keeps_most_recent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_max_entries(3);

        for i in 0..10 {
            store.append("job", &entry(i as f64, true)).unwrap();
        }

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn read_all_skips_blank_and_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        store.append("job", &entry(1.0, true)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log_path("job"))
            .unwrap();
        file.write_all(b"\nINFO some stray output\n{\"timestamp\": 2.0, \"url\"").unwrap();
        drop(file);
        store.append("job", &entry(3.0, false)).unwrap();

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 3.0]);
    }

    #[test]
    fn invalid_utf8_line_is_skipped_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_max_entries(10);
        store.append("job", &entry(1.0, true)).unwrap();
        store.append("job", &entry(2.0, true)).unwrap();

        // A write torn inside a multibyte character.
        let mut file = OpenOptions::new()
            .append(true)
            .open(store.log_path("job"))
            .unwrap();
        file.write_all(b"{\"error\":\"caf\xC3").unwrap();
        drop(file);

        store.append("job", &entry(3.0, false)).unwrap();

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0]);

        let tail = store.tail("job", 2).unwrap().unwrap();
        assert!(tail.starts_with("{\"error\":\"caf\u{FFFD}"));
        assert!(tail.lines().nth(1).unwrap().contains("\"timestamp\":3.0"));
    }

    #[test]
    fn trim_survives_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_max_entries(2);
        store.append("job", &entry(1.0, true)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(store.log_path("job"))
            .unwrap()
            .write_all(b"\xFF\xFE stray stderr\n")
            .unwrap();

        store.append("job", &entry(2.0, true)).unwrap();
        store.append("job", &entry(3.0, true)).unwrap();

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![2.0, 3.0]);
    }

    #[test]
    fn read_all_on_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HistoryStore::new(dir.path()).read_all("nope").is_empty());
    }

    #[test]
    fn tail_returns_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        for i in 0..4 {
            store.append("job", &entry(i as f64, true)).unwrap();
        }

        let tail = store.tail("job", 2).unwrap().unwrap();
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"timestamp\":2.0"));
        assert!(lines[1].contains("\"timestamp\":3.0"));
        assert!(tail.ends_with('\n'));

        assert_eq!(store.tail("job", 100).unwrap().unwrap().lines().count(), 4);
    }

    #[test]
    fn tail_of_missing_log_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HistoryStore::new(dir.path()).tail("nope", 5).unwrap().is_none());
    }

    fn age_file(path: &Path, by: Duration) -> SystemTime {
        let old = SystemTime::now() - by;
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(old)
            .unwrap();
        std::fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn stale_log_is_rotated_before_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_rotation(Duration::from_secs(3600));

        store.append("job", &entry(1.0, true)).unwrap();
        store.append("job", &entry(2.0, true)).unwrap();
        let modified = age_file(&store.log_path("job"), Duration::from_secs(2 * 86_400));

        store.append("job", &entry(3.0, false)).unwrap();

        let rotated = rotated_path(&store.log_path("job"), modified);
        let archived = std::fs::read_to_string(&rotated).unwrap();
        assert_eq!(archived.lines().count(), 2);

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![3.0]);
    }

    #[test]
    fn open_append_handle_follows_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_rotation(Duration::from_secs(3600));
        store.append("job", &entry(1.0, true)).unwrap();

        // Stands in for a detached child's redirected stderr.
        let mut child_stderr = OpenOptions::new()
            .append(true)
            .open(store.log_path("job"))
            .unwrap();
        let modified = age_file(&store.log_path("job"), Duration::from_secs(2 * 86_400));

        store.append("job", &entry(2.0, true)).unwrap();
        child_stderr.write_all(b"WARN after rotation\n").unwrap();
        drop(child_stderr);

        let active = std::fs::read_to_string(store.log_path("job")).unwrap();
        assert!(active.contains("WARN after rotation"));
        let archived =
            std::fs::read_to_string(rotated_path(&store.log_path("job"), modified)).unwrap();
        assert!(!archived.contains("WARN after rotation"));
        assert_eq!(archived.lines().count(), 1);

        let stamps: Vec<f64> = store.read_all("job").iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![2.0]);
    }

    #[test]
    fn fresh_log_is_not_rotated() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_rotation(Duration::from_secs(3600));

        store.append("job", &entry(1.0, true)).unwrap();
        store.append("job", &entry(2.0, true)).unwrap();

        assert_eq!(store.read_all("job").len(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn rotation_never_clobbers_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path()).with_rotation(Duration::from_secs(60));

        store.append("job", &entry(1.0, true)).unwrap();
        let modified = age_file(&store.log_path("job"), Duration::from_secs(3600));
        let rotated = rotated_path(&store.log_path("job"), modified);
        std::fs::write(&rotated, "already here\n").unwrap();

        store.append("job", &entry(2.0, true)).unwrap();

        assert_eq!(std::fs::read_to_string(&rotated).unwrap(), "already here\n");
        assert_eq!(store.read_all("job").len(), 2);
    }

    #[test]
    fn from_config_honours_zero_as_disabled() {
        let config = MonitorConfig {
            max_log_entries: 0,
            log_rotate_interval: 0,
            ..MonitorConfig::default()
        };
        let store = HistoryStore::from_config(&config);
        assert_eq!(store.max_entries, 0);
        assert!(store.rotate_after.is_none());
    }
}
