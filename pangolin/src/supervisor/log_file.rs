//! Client log file: daily rotation, retention pruning and tail reads.
//!
//! The active log keeps a fixed name. When a run starts on a later calendar
//! day than the file was last written, the file is renamed to
//! `client-YYYY-MM-DD.log` (its own last-modified date) and siblings older than
//! the retention window are removed.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use thiserror::Error;

pub const ROTATED_PREFIX: &str = "client-";
pub const ROTATED_SUFFIX: &str = ".log";
pub const RETENTION_DAYS: u64 = 30;

/// Bytes read from the end of the file when tailing.
const TAIL_WINDOW_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stat log file {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to rotate log file {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// An opened log file, ready to become the process's log sink.
#[derive(Debug)]
pub struct PreparedLog {
    pub path: PathBuf,
    pub file: File,
    /// Where yesterday's (or older) file went, if it was rotated.
    pub rotated_to: Option<PathBuf>,
    /// Rotation failed; logging continues in the existing file.
    pub rotation_error: Option<LogFileError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Create the directory, rotate a stale file, and open for append.
    pub fn prepare(&self) -> Result<PreparedLog, LogFileError> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(|source| LogFileError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let (rotated_to, rotation_error) = match self.rotate() {
            Ok(rotated) => (rotated, None),
            Err(e) => (None, Some(e)),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LogFileError::Open {
                path: self.path.clone(),
                source,
            })?;

        Ok(PreparedLog {
            path: self.path.clone(),
            file,
            rotated_to,
            rotation_error,
        })
    }

    /// Rotate if the file was last written on an earlier day than today.
    pub fn rotate(&self) -> Result<Option<PathBuf>, LogFileError> {
        self.rotate_at(Local::now())
    }

    pub(crate) fn rotate_at(&self, now: DateTime<Local>) -> Result<Option<PathBuf>, LogFileError> {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LogFileError::Stat {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let modified: DateTime<Local> = modified.into();
        if modified.date_naive() == now.date_naive() {
            return Ok(None);
        }

        let dir = self.dir();
        let rotated = dir.join(rotated_file_name(&modified));
        fs::rename(&self.path, &rotated).map_err(|source| LogFileError::Rename {
            from: self.path.clone(),
            to: rotated.clone(),
            source,
        })?;

        let removed = cleanup(&dir, now.into(), RETENTION_DAYS);
        tracing::debug!(rotated = %rotated.display(), removed, "rotated client log");
        Ok(Some(rotated))
    }
}

/// `client-YYYY-MM-DD.log` for the given day.
pub fn rotated_file_name(day: &DateTime<Local>) -> String {
    format!(
        "{ROTATED_PREFIX}{}{ROTATED_SUFFIX}",
        day.format("%Y-%m-%d")
    )
}

fn is_rotated_name(name: &str) -> bool {
    name.starts_with(ROTATED_PREFIX) && name.ends_with(ROTATED_SUFFIX)
}

/// Delete rotated logs in `dir` last modified more than `days_to_keep` days before `now`.
///
/// Best effort: entries that cannot be inspected or removed are skipped.
/// Returns how many files were deleted.
pub fn cleanup(dir: &Path, now: SystemTime, days_to_keep: u64) -> usize {
    let keep = Duration::from_secs(days_to_keep * 24 * 60 * 60);
    let Some(cutoff) = now.checked_sub(keep) else {
        return 0;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_rotated_name(name) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified < cutoff && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Read the last lines of a file another process may still be appending to.
///
/// Only the final window of the file is read; a line cut by the window start is
/// dropped. Invalid UTF-8 is replaced rather than rejected.
pub fn read_tail(path: &Path, max_lines: usize) -> Vec<String> {
    if max_lines == 0 {
        return Vec::new();
    }
    let Ok(mut file) = File::open(path) else {
        return Vec::new();
    };
    let Ok(len) = file.metadata().map(|m| m.len()) else {
        return Vec::new();
    };

    // Start one byte early so we can tell whether the window begins on a line
    // boundary.
    let start = len.saturating_sub(TAIL_WINDOW_BYTES + 1);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return Vec::new();
    }
    let mut buf = Vec::new();
    if file
        .take(TAIL_WINDOW_BYTES + 1)
        .read_to_end(&mut buf)
        .is_err()
    {
        return Vec::new();
    }

    let mut body: &[u8] = &buf;
    if start > 0 {
        body = match body.iter().position(|b| *b == b'\n') {
            Some(i) => &body[i + 1..],
            None => &[],
        };
    }

    let text = String::from_utf8_lossy(body);
    let lines: Vec<&str> = text.lines().collect();
    let keep = lines.len().saturating_sub(max_lines);
    lines[keep..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn set_modified(path: &Path, when: SystemTime) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap()
    }

    #[test]
    fn rotate_without_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let log = LogFile::new(dir.path().join("client.log"));
        assert_eq!(log.rotate().unwrap(), None);
    }

    #[test]
    fn rotate_same_day_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        fs::write(&path, "today\n").unwrap();
        set_modified(&path, local(2026, 3, 10, 9).into());

        let log = LogFile::new(&path);
        assert_eq!(log.rotate_at(local(2026, 3, 10, 21)).unwrap(), None);
        assert!(path.exists());
    }

    #[test]
    fn rotate_renames_by_last_modified_date() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        fs::write(&path, "old\n").unwrap();
        set_modified(&path, local(2026, 3, 9, 22).into());

        let log = LogFile::new(&path);
        let rotated = log.rotate_at(local(2026, 3, 12, 8)).unwrap();
        let expected = dir.path().join("client-2026-03-09.log");
        assert_eq!(rotated.as_deref(), Some(expected.as_path()));
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(expected).unwrap(), "old\n");
    }

    #[test]
    fn rotate_is_idempotent_within_a_day() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        fs::write(&path, "old\n").unwrap();
        set_modified(&path, local(2026, 3, 9, 12).into());

        let log = LogFile::new(&path);
        let now = local(2026, 3, 10, 12);
        assert!(log.rotate_at(now).unwrap().is_some());
        assert_eq!(log.rotate_at(now).unwrap(), None);

        // A fresh file written today does not rotate either.
        fs::write(&path, "new\n").unwrap();
        set_modified(&path, local(2026, 3, 10, 12).into());
        assert_eq!(log.rotate_at(now).unwrap(), None);

        let rotated: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| is_rotated_name(&e.file_name().to_string_lossy()))
            .collect();
        assert_eq!(rotated.len(), 1);
    }

    #[test]
    fn rotation_prunes_expired_siblings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        let now = local(2026, 3, 12, 8);
        fs::write(&path, "old\n").unwrap();
        set_modified(&path, local(2026, 3, 11, 8).into());

        let expired = dir.path().join("client-2026-01-01.log");
        fs::write(&expired, "").unwrap();
        set_modified(&expired, local(2026, 1, 1, 8).into());

        LogFile::new(&path).rotate_at(now).unwrap();
        assert!(!expired.exists());
        assert!(dir.path().join("client-2026-03-11.log").exists());
    }

    #[test]
    fn prepare_rotates_yesterdays_file_and_opens_fresh_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("client.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "yesterday\n").unwrap();
        let yesterday = SystemTime::now() - DAY - Duration::from_secs(60 * 60);
        set_modified(&path, yesterday);
        let yesterday_local: DateTime<Local> = yesterday.into();
        assert_ne!(yesterday_local.date_naive(), Local::now().date_naive());

        let mut prepared = LogFile::new(&path).prepare().unwrap();
        assert_eq!(prepared.path, path);
        let expected = path
            .parent()
            .unwrap()
            .join(rotated_file_name(&yesterday_local));
        assert_eq!(prepared.rotated_to.as_deref(), Some(expected.as_path()));
        assert!(prepared.rotation_error.is_none());
        assert_eq!(fs::read_to_string(&expected).unwrap(), "yesterday\n");

        writeln!(prepared.file, "today").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "today\n");
    }

    #[test]
    fn prepare_creates_missing_directory_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("client.log");

        let mut first = LogFile::new(&path).prepare().unwrap();
        writeln!(first.file, "one").unwrap();
        drop(first);
        let mut second = LogFile::new(&path).prepare().unwrap();
        writeln!(second.file, "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn cleanup_respects_retention_window() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        let mut expired = Vec::new();
        let mut retained = Vec::new();

        for i in 0..5u64 {
            let old = dir.path().join(format!("client-old-{i}.log"));
            fs::write(&old, "").unwrap();
            set_modified(&old, now - DAY * (31 + i as u32));
            expired.push(old);

            let recent = dir.path().join(format!("client-recent-{i}.log"));
            fs::write(&recent, "").unwrap();
            set_modified(&recent, now - DAY * (i as u32 * 7) - Duration::from_secs(60));
            retained.push(recent);
        }

        let unrelated = dir.path().join("server-2020-01-01.log");
        fs::write(&unrelated, "").unwrap();
        set_modified(&unrelated, now - DAY * 400);
        let active = dir.path().join("client.log");
        fs::write(&active, "").unwrap();
        set_modified(&active, now - DAY * 400);

        assert_eq!(cleanup(dir.path(), now, RETENTION_DAYS), 5);
        assert!(expired.iter().all(|p| !p.exists()));
        assert!(retained.iter().all(|p| p.exists()));
        assert!(unrelated.exists());
        assert!(active.exists());
    }

    #[test]
    fn cleanup_of_missing_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cleanup(&dir.path().join("nope"), SystemTime::now(), RETENTION_DAYS), 0);
    }

    #[test]
    fn tail_returns_last_lines_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        fs::write(&path, "l1\nl2\nl3\nl4\n").unwrap();
        assert_eq!(read_tail(&path, 2), vec!["l3", "l4"]);
        assert_eq!(read_tail(&path, 10).len(), 4);
        assert!(read_tail(&dir.path().join("missing.log"), 5).is_empty());
    }

    #[test]
    fn tail_tolerates_partial_last_line_and_bad_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        fs::write(&path, b"first\nsecond \xff\nthird-in-progr").unwrap();
        let tail = read_tail(&path, 2);
        assert_eq!(tail.len(), 2);
        assert!(tail[0].starts_with("second "));
        assert_eq!(tail[1], "third-in-progr");
    }

    #[test]
    fn tail_drops_line_cut_by_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        let long = "x".repeat(TAIL_WINDOW_BYTES as usize);
        fs::write(&path, format!("{long}\nlast\n")).unwrap();
        assert_eq!(read_tail(&path, 5), vec!["last"]);
    }
}
