//! Run bookkeeping log.
//!
//! The pipeline writes its milestones and failures to a [`RunLog`] passed in by
//! the caller. [`RunScope`] brackets a run with the start/end lines and
//! guarantees the end line is written even when the run returns early.
//!
//! ```text
//! 2024-03-04 10:00:00====INFO====***************start***************
//! 2024-03-04 10:00:00====INFO====loaded 3 transaction files (1200 records)
//! 2024-03-04 10:00:01====ERROR====bucket stage failed: tx/a.json:7: invalid date_of_purchase 'soon'
//! 2024-03-04 10:00:01====INFO====***************end***************. Reason: ... Time taken: 0:00:01.024311
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log level of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A single run log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// `timestamp====LEVEL====message`
    pub fn format_line(&self) -> String {
        format!(
            "{}===={}===={}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.message
        )
    }
}

/// Sink for run log entries.
pub trait RunLog {
    fn record(&mut self, entry: LogEntry);

    fn info(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(LogEntry::info(message));
    }

    fn warning(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(LogEntry::warning(message));
    }

    fn error(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(LogEntry::error(message));
    }
}

impl<L: RunLog + ?Sized> RunLog for &mut L {
    fn record(&mut self, entry: LogEntry) {
        (**self).record(entry);
    }
}

// =============================================================================
// In-memory sink
// =============================================================================

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    entries: Vec<LogEntry>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }
}

impl RunLog for MemoryRunLog {
    fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

// =============================================================================
// Rotating file sink
// =============================================================================

/// Size-based rotation: `log` → `log.1` → ... → `log.<backups>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotation {
    /// Rotate before a write would exceed this size. 0 disables rotation.
    pub max_bytes: u64,
    /// Rotated files to keep.
    pub backups: usize,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            backups: 3,
        }
    }
}

/// Appends formatted entries to a file, rotating by size.
#[derive(Debug)]
pub struct FileRunLog {
    path: PathBuf,
    file: File,
    size: u64,
    rotation: Rotation,
}

impl FileRunLog {
    pub fn open(path: impl AsRef<Path>, rotation: Rotation) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file,
            size,
            rotation,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        let limit = self.rotation.max_bytes;
        if limit > 0 && self.size > 0 && self.size + len > limit {
            self.rotate()?;
        }
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        self.size += len;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if self.rotation.backups == 0 {
            self.file = File::create(&self.path)?;
            self.size = 0;
            return Ok(());
        }

        for i in (1..self.rotation.backups).rev() {
            let from = backup_path(&self.path, i);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, i + 1))?;
            }
        }
        fs::rename(&self.path, backup_path(&self.path, 1))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl RunLog for FileRunLog {
    fn record(&mut self, entry: LogEntry) {
        if let Err(e) = self.write_line(&entry.format_line()) {
            warn!(path = %self.path.display(), error = %e, "cannot write run log");
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

// =============================================================================
// Run scope
// =============================================================================

/// Brackets one run in the log.
///
/// Writes the start line on [`RunScope::open`] and the end line on
/// [`RunScope::finish`], or with reason `aborted` when dropped unfinished.
pub struct RunScope<L: RunLog> {
    log: L,
    started: Instant,
    finished: bool,
}

impl<L: RunLog> RunScope<L> {
    pub fn open(mut log: L) -> Self {
        log.record(LogEntry::info("***************start***************"));
        Self {
            log,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Write the end line. An empty reason means a normal completion.
    pub fn finish(&mut self, reason: &str) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.elapsed();
        self.log.record(LogEntry::info(format!(
            "***************end***************. Reason: {}. Time taken: {}",
            reason,
            format_elapsed(elapsed)
        )));
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}

impl<L: RunLog> RunLog for RunScope<L> {
    fn record(&mut self, entry: LogEntry) {
        self.log.record(entry);
    }
}

impl<L: RunLog> Drop for RunScope<L> {
    fn drop(&mut self) {
        self.finish("aborted");
    }
}

/// `H:MM:SS.ffffff`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_micros()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_line_format() {
        let entry = LogEntry::error("product/customer master read error");
        let line = entry.format_line();

        let parts: Vec<&str> = line.split("====").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "2024-01-01 00:00:00".len());
        assert_eq!(parts[1], "ERROR");
        assert_eq!(parts[2], "product/customer master read error");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_micros(1_024_311)), "0:00:01.024311");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1:02:05.000000");
    }

    #[test]
    fn test_scope_start_and_end() {
        let mut memory = MemoryRunLog::new();
        {
            let mut scope = RunScope::open(&mut memory);
            scope.info("working");
            scope.finish("");
        }

        let messages = memory.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "***************start***************");
        assert_eq!(messages[1], "working");
        assert!(messages[2]
            .starts_with("***************end***************. Reason: . Time taken: "));
    }

    #[test]
    fn test_scope_dropped_unfinished_still_closes() {
        let mut memory = MemoryRunLog::new();
        {
            let mut scope = RunScope::open(&mut memory);
            scope.error("load stage failed");
        }

        let messages = memory.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[2].contains("Reason: aborted."));
        assert_eq!(memory.entries()[1].level, LogLevel::Error);
    }

    #[test]
    fn test_file_log_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");

        {
            let mut log = FileRunLog::open(&path, Rotation::default()).unwrap();
            log.info("first");
        }
        {
            let mut log = FileRunLog::open(&path, Rotation::default()).unwrap();
            log.info("second");
        }

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("====INFO====first"));
        assert!(lines[1].ends_with("====INFO====second"));
    }

    #[test]
    fn test_file_log_rotates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        let rotation = Rotation {
            max_bytes: 60,
            backups: 2,
        };

        let mut log = FileRunLog::open(&path, rotation).unwrap();
        for i in 0..4 {
            log.info(format!("message number {}", i));
        }

        // each line is longer than half the limit, so every write rotates
        let current = fs::read_to_string(&path).unwrap();
        let first_backup = fs::read_to_string(dir.path().join("run.log.1")).unwrap();
        let second_backup = fs::read_to_string(dir.path().join("run.log.2")).unwrap();
        assert!(current.contains("message number 3"));
        assert!(first_backup.contains("message number 2"));
        assert!(second_backup.contains("message number 1"));
        assert!(!dir.path().join("run.log.3").exists());
    }
}
