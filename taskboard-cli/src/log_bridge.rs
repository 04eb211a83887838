use env_logger::Logger;
use log::{Log, Metadata, Record, SetLoggerError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskboard")
            .join("logs")
            .join("taskboard.log");
        let file = Self::open(&path).ok();
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn append_line(&self, line: &str) {
        let mut guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_none() {
            if let Ok(file) = Self::open(&self.path) {
                *guard = Some(file);
            } else {
                return;
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.write_all(b"\n");
            let _ = file.flush();
        }
    }
}

static LOG_FILE: LazyLock<LogFile> = LazyLock::new(LogFile::new);

fn format_log_line(level: &str, target: &str, message: &str) -> String {
    format!(
        "{} [{}] [{}] {}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        level.to_uppercase(),
        target,
        message.replace('\n', "\\n")
    )
}

/// Writes to stderr through env_logger and appends every record it lets
/// through to the log file.
struct TeeLogger {
    inner: Logger,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        LOG_FILE.append_line(&format_log_line(
            record.level().as_str(),
            record.target(),
            &record.args().to_string(),
        ));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger. Filter defaults to `warn`, `RUST_LOG` overrides it.
pub fn init() -> Result<(), SetLoggerError> {
    let _ = &*LOG_FILE;
    let logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .build();
    let max_level = logger.filter();
    let logger = Box::leak(Box::new(TeeLogger { inner: logger }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}

pub fn log_file_path() -> String {
    LOG_FILE.path.display().to_string()
}

/// Record a line when the logger itself could not be installed.
pub fn write_fallback_line(message: &str) {
    LOG_FILE.append_line(&format_log_line("error", "taskboard.log_bridge", message));
}
