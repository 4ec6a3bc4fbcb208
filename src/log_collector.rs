//! Console logging backend for the `log` facade.
//!
//! Every record goes to stderr as `[HH:MM:SS.mmm] [LEVEL] message`. When a
//! log file is configured the same line is appended to it and flushed right
//! away, so a run that dies mid-way still leaves its trail on disk.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ConsoleLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
    file_path: Option<PathBuf>,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        ConsoleLogger {
            level,
            file: None,
            file_path: None,
        }
    }

    /// Mirror every line to `path` (append mode, parents created).
    pub fn with_file(mut self, path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create log directory: {}", e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;
        self.file = Some(Mutex::new(file));
        self.file_path = Some(path.to_path_buf());
        Ok(self)
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn format_line(record: &Record) -> String {
        format!(
            "[{}] [{}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format_line(record);
        eprintln!("{}", line);

        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                if let Err(e) = writeln!(f, "{}", line).and_then(|_| f.flush()) {
                    eprintln!("[Log] Failed to write to log file: {}", e);
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Level for a `-v` count: 0 = info, 1 = debug, 2+ = trace
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the process-wide logger. Fails if one is already installed.
pub fn init_global_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<(), String> {
    let mut logger = ConsoleLogger::new(level);
    if let Some(path) = log_file {
        logger = logger.with_file(path)?;
    }

    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| format!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    log::debug!("[Log] Logger initialized at {}", level.to_level().unwrap_or(Level::Error));
    Ok(())
}
