// relaycard/src/logging.rs
//
// Timestamped logging handle. Each component receives a `Logger` at
// construction; there is no process-wide log state.

use std::fmt;
use std::io::Write as _;
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::error::{RelayError, Result};

/// Cloneable log sink. Writes to stderr and, once file logging is started,
/// to a timestamped file in the reports directory as well.
#[derive(Clone)]
pub struct Logger {
    file: Arc<Mutex<Option<std::fs::File>>>,
    verbose: Arc<AtomicBool>,
    stderr: bool,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Logger writing to stderr only.
    pub fn new() -> Self {
        Self {
            file: Arc::new(Mutex::new(None)),
            verbose: Arc::new(AtomicBool::new(false)),
            stderr: true,
        }
    }

    /// Logger that drops everything unless file logging is started.
    pub fn silent() -> Self {
        Self {
            stderr: false,
            ..Self::new()
        }
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Start file logging to the given reports directory.
    /// Creates a timestamped log file and a `relaycard.log` symlink (Unix only).
    pub fn start_file_logging(&self, reports_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(reports_dir).map_err(|e| {
            RelayError::configuration(format!("Failed to create reports dir: {}", e))
        })?;

        let filename = chrono::Local::now()
            .format("%Y%m%d-%H%M%S-relaycard.log")
            .to_string();
        let log_path = reports_dir.join(&filename);

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        #[cfg(unix)]
        {
            let symlink_path = reports_dir.join("relaycard.log");
            let _ = std::fs::remove_file(&symlink_path);
            if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
                self.write(format_args!("[logging] Failed to create relaycard.log symlink: {}", e));
            }
        }

        if let Ok(mut guard) = self.file.lock() {
            *guard = Some(file);
        }

        self.write(format_args!("[logging] File logging started: {}", log_path.display()));
        Ok(())
    }

    /// Stop file logging and close the log file.
    pub fn stop_file_logging(&self) {
        let stopped = match self.file.lock() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => false,
        };
        if stopped {
            self.write(format_args!("[logging] File logging stopped"));
        }
    }

    /// Write one line prefixed with local `HH:MM:SS.mmm`.
    pub fn write(&self, args: fmt::Arguments<'_>) {
        let msg = format!("{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), args);
        if self.stderr {
            eprintln!("{}", msg);
        }
        if let Ok(mut guard) = self.file.lock() {
            if let Some(ref mut f) = *guard {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }
}

/// Timestamped logging macro.
/// `tlog!(logger, "[component] fmt", args...)`
#[macro_export]
macro_rules! tlog {
    ($log:expr, $($arg:tt)*) => {{
        $log.write(format_args!($($arg)*));
    }};
}

/// Like `tlog!`, but only when the logger is verbose.
#[macro_export]
macro_rules! tdebug {
    ($log:expr, $($arg:tt)*) => {{
        if $log.is_verbose() {
            $log.write(format_args!($($arg)*));
        }
    }};
}
