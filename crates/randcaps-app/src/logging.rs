use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::MakeWriter;

pub const LOG_FILE_PREFIX: &str = "randcaps-";
pub const LOG_FILE_SUFFIX: &str = ".log";
pub const LOG_RETENTION_DAYS: i64 = 14;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Log to daily files under `log_dir`, pruning files older than the
/// retention window.
pub fn init_logging(log_dir: &str) -> Result<()> {
    let log_dir = PathBuf::from(log_dir);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    cleanup_old_logs(&log_dir, Utc::now(), LOG_RETENTION_DAYS)?;

    let writer = DailyLogWriter::new(log_dir, LOG_RETENTION_DAYS)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(())
}

pub fn init_console_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

#[derive(Debug)]
struct DailyState {
    day_key: String,
    file: File,
}

#[derive(Clone, Debug)]
struct DailyLogWriter {
    log_dir: PathBuf,
    retention_days: i64,
    state: Arc<Mutex<DailyState>>,
}

impl DailyLogWriter {
    fn new(log_dir: PathBuf, retention_days: i64) -> Result<Self> {
        let day_key = day_key(Utc::now());
        let file = open_log_file(&log_dir, &day_key)?;
        Ok(Self {
            log_dir,
            retention_days,
            state: Arc::new(Mutex::new(DailyState { day_key, file })),
        })
    }

    fn write_at(&self, now: DateTime<Utc>, buf: &[u8]) -> io::Result<usize> {
        let key = day_key(now);
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("failed to lock log writer"))?;

        if state.day_key != key {
            state.file.flush()?;
            state.file = open_log_file(&self.log_dir, &key)?;
            state.day_key = key;
            let _ = cleanup_old_logs(&self.log_dir, now, self.retention_days);
        }

        state.file.write(buf)
    }
}

impl<'a> MakeWriter<'a> for DailyLogWriter {
    type Writer = DailyLogHandle;

    fn make_writer(&'a self) -> Self::Writer {
        DailyLogHandle {
            inner: self.clone(),
        }
    }
}

struct DailyLogHandle {
    inner: DailyLogWriter,
}

impl Write for DailyLogHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_at(Utc::now(), buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| io::Error::other("failed to lock log writer"))?;
        state.file.flush()
    }
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn log_file_path(log_dir: &Path, day: &str) -> PathBuf {
    log_dir.join(format!("{LOG_FILE_PREFIX}{day}{LOG_FILE_SUFFIX}"))
}

fn open_log_file(log_dir: &Path, day: &str) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(log_dir, day))
}

pub fn cleanup_old_logs(log_dir: &Path, now: DateTime<Utc>, retention_days: i64) -> Result<()> {
    let cutoff = (now - Duration::days(retention_days)).date_naive();
    let entries = match fs::read_dir(log_dir) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", log_dir.display())),
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(day) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(parse_log_filename_day)
        else {
            continue;
        };
        if day < cutoff {
            let _ = fs::remove_file(&path);
        }
    }
    Ok(())
}

fn parse_log_filename_day(file_name: &str) -> Option<NaiveDate> {
    let body = file_name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    NaiveDate::parse_from_str(body, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("randcaps_logging_test_{}", Uuid::new_v4()))
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_log_filename_day() {
        assert!(parse_log_filename_day("randcaps-2026-10-17.log").is_some());
        assert!(parse_log_filename_day("randcaps-2026-10-17-10.log").is_none());
        assert!(parse_log_filename_day("other-2026-10-17.log").is_none());
    }

    #[test]
    fn test_cleanup_old_logs_keeps_recent_removes_old() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("randcaps-2026-01-01.log"), "old").unwrap();
        fs::write(dir.join("randcaps-2026-10-16.log"), "new").unwrap();
        fs::write(dir.join("notes.txt"), "keep").unwrap();

        cleanup_old_logs(&dir, at("2026-10-17T08:00:00Z"), 14).unwrap();

        assert!(!dir.join("randcaps-2026-01-01.log").exists());
        assert!(dir.join("randcaps-2026-10-16.log").exists());
        assert!(dir.join("notes.txt").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cleanup_missing_dir_is_ok() {
        assert!(cleanup_old_logs(&test_dir(), Utc::now(), 14).is_ok());
    }

    #[test]
    fn test_writer_rotates_on_day_change() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        let writer = DailyLogWriter::new(dir.clone(), 14).unwrap();

        writer.write_at(at("2030-01-01T23:59:00Z"), b"a\n").unwrap();
        writer.write_at(at("2030-01-02T00:01:00Z"), b"b\n").unwrap();

        let first = fs::read_to_string(dir.join("randcaps-2030-01-01.log")).unwrap();
        let second = fs::read_to_string(dir.join("randcaps-2030-01-02.log")).unwrap();
        assert_eq!(first, "a\n");
        assert_eq!(second, "b\n");
        let _ = fs::remove_dir_all(&dir);
    }
}
