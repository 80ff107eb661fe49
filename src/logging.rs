//! Structured file logs.
//!
//! Newline-delimited JSON appended to a fixed set of channel files,
//! rotated by size with a bounded number of generations
//! (`name.log` → `name.log.1` → … → dropped). The console keeps using
//! `tracing`; these files are the durable record the admin API can tail.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

/// Log channels and their rotation policy `(file, max_bytes, generations)`.
const CHANNELS: &[(&str, u64, usize)] = &[
    ("error.log", 5 * 1024 * 1024, 5),
    ("combined.log", 10 * 1024 * 1024, 5),
    ("http.log", 5 * 1024 * 1024, 3),
    ("scraping.log", 5 * 1024 * 1024, 3),
    ("exceptions.log", 5 * 1024 * 1024, 3),
    ("rejections.log", 5 * 1024 * 1024, 3),
];

/// A named log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Error,
    Http,
    Scraping,
    Exceptions,
    Rejections,
}

impl Channel {
    fn file_name(&self) -> &'static str {
        match self {
            Self::Error => "error.log",
            Self::Http => "http.log",
            Self::Scraping => "scraping.log",
            Self::Exceptions => "exceptions.log",
            Self::Rejections => "rejections.log",
        }
    }
}

struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    generations: usize,
}

impl RotatingFile {
    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Ok(meta) = std::fs::metadata(&self.path) {
            if meta.len() + line.len() as u64 > self.max_bytes {
                self.rotate();
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")
    }

    fn rotate(&self) {
        // Shift name.log.(n-1) → name.log.n, dropping the oldest.
        for gen in (1..self.generations).rev() {
            let from = self.numbered(gen);
            let to = self.numbered(gen + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        let _ = std::fs::rename(&self.path, self.numbered(1));
        let _ = std::fs::remove_file(self.numbered(self.generations + 1));
    }

    fn numbered(&self, generation: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{generation}"));
        PathBuf::from(name)
    }
}

/// The full set of structured log files.
pub struct FileLogs {
    dir: PathBuf,
    // One writer lock; channel files are small and writes are rare enough
    // that finer granularity buys nothing.
    lock: Mutex<()>,
}

impl FileLogs {
    pub fn new(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("could not create log directory {}: {}", dir.display(), e);
        }
        Self {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append an entry to a channel and to the combined log. Errors also
    /// land in `error.log`.
    pub fn log(&self, channel: Channel, level: &str, message: &str, mut fields: Value) {
        if !fields.is_object() {
            fields = json!({});
        }
        let mut entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message,
        });
        if let (Some(obj), Some(extra)) = (entry.as_object_mut(), fields.as_object()) {
            for (key, value) in extra {
                obj.insert(key.clone(), value.clone());
            }
        }
        let line = entry.to_string();

        let _guard = self.lock.lock().unwrap();
        self.write_channel(channel.file_name(), &line);
        self.write_channel("combined.log", &line);
        if level == "error" && channel != Channel::Error {
            self.write_channel("error.log", &line);
        }
    }

    fn write_channel(&self, file_name: &str, line: &str) {
        let Some((_, max_bytes, generations)) =
            CHANNELS.iter().find(|(name, _, _)| *name == file_name)
        else {
            return;
        };
        let file = RotatingFile {
            path: self.dir.join(file_name),
            max_bytes: *max_bytes,
            generations: *generations,
        };
        if let Err(e) = file.append(line) {
            warn!("file log write to {} failed: {}", file_name, e);
        }
    }
}

/// Validate a tail-endpoint filename: `^[A-Za-z0-9_\-.]+\.log$` with no
/// path traversal.
pub fn is_valid_log_name(name: &str) -> bool {
    name.ends_with(".log")
        && name.len() > 4
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.contains("..")
}

/// Read the last `max_lines` lines of a log file.
pub fn tail(dir: &Path, file_name: &str, max_lines: usize) -> std::io::Result<Vec<String>> {
    let file = File::open(dir.join(file_name))?;
    let reader = BufReader::new(file);
    let mut lines: std::collections::VecDeque<String> =
        std::collections::VecDeque::with_capacity(max_lines);
    for line in reader.lines() {
        let line = line?;
        if lines.len() == max_lines {
            lines.pop_front();
        }
        lines.push_back(line);
    }
    Ok(lines.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_writes_channel_and_combined() {
        let dir = tempfile::tempdir().unwrap();
        let logs = FileLogs::new(dir.path());
        logs.log(
            Channel::Scraping,
            "info",
            "run finished",
            json!({"adapter": "news", "found": 3}),
        );

        let scraping = std::fs::read_to_string(dir.path().join("scraping.log")).unwrap();
        let combined = std::fs::read_to_string(dir.path().join("combined.log")).unwrap();
        assert!(scraping.contains("run finished"));
        assert!(combined.contains("\"adapter\":\"news\""));

        let parsed: Value = serde_json::from_str(scraping.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["found"], 3);
    }

    #[test]
    fn test_error_level_copies_to_error_log() {
        let dir = tempfile::tempdir().unwrap();
        let logs = FileLogs::new(dir.path());
        logs.log(Channel::Http, "error", "fetch blew up", json!({}));
        let errors = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
        assert!(errors.contains("fetch blew up"));
    }

    #[test]
    fn test_rotation_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = RotatingFile {
            path: dir.path().join("small.log"),
            max_bytes: 64,
            generations: 2,
        };
        for i in 0..20 {
            file.append(&format!("line number {i} with some padding"))
                .unwrap();
        }
        assert!(dir.path().join("small.log").exists());
        assert!(dir.path().join("small.log.1").exists());
        // Only the configured generations survive.
        assert!(!dir.path().join("small.log.3").exists());
    }

    #[test]
    fn test_valid_log_names() {
        assert!(is_valid_log_name("error.log"));
        assert!(is_valid_log_name("combined.log"));
        assert!(is_valid_log_name("scraping-2026.log"));
        assert!(!is_valid_log_name("../etc/passwd"));
        assert!(!is_valid_log_name("nolog.txt"));
        assert!(!is_valid_log_name(".log"));
        assert!(!is_valid_log_name("a/b.log"));
    }

    #[test]
    fn test_tail_returns_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logs = FileLogs::new(dir.path());
        for i in 0..10 {
            logs.log(Channel::Scraping, "info", &format!("entry {i}"), json!({}));
        }
        let lines = tail(dir.path(), "scraping.log", 3).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("entry 9"));
    }
}
