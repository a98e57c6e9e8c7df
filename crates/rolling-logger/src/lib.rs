//! Rolling File Logger
//!
//! Installs a `tracing` subscriber that writes formatted lines to a size-rotated
//! log file and keeps the most recent lines in a circular buffer so a running
//! client can show them without reading the file back. `log` records are bridged
//! into the same subscriber, so crates using the `log` macros end up here too.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_subscriber::fmt::MakeWriter;

/// Rotate once the active file grows past this many bytes
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Rotated files kept next to the active one (`app.log.1` .. `app.log.N`)
pub const DEFAULT_MAX_FILES: usize = 3;
/// Lines retained in memory
pub const DEFAULT_BUFFER_LINES: usize = 200;

static LOGGER: OnceLock<RollingWriter> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
    #[error("log file error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
}

/// Rotation and buffer limits
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub max_file_bytes: u64,
    pub max_files: usize,
    pub buffer_lines: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files: DEFAULT_MAX_FILES,
            buffer_lines: DEFAULT_BUFFER_LINES,
        }
    }
}

struct WriterState {
    file: File,
    written: u64,
    recent: VecDeque<String>,
    partial: String,
}

/// Shared sink behind the subscriber: file with rotation plus the line buffer
#[derive(Clone)]
pub struct RollingWriter {
    path: PathBuf,
    options: LoggerOptions,
    state: Arc<Mutex<WriterState>>,
}

impl RollingWriter {
    /// Open (or create) `<log_dir>/<app_name>.log` for appending
    pub fn open(log_dir: &Path, app_name: &str, options: LoggerOptions) -> Result<Self, LoggerError> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(format!("{}.log", app_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path,
            options,
            state: Arc::new(Mutex::new(WriterState {
                file,
                written,
                recent: VecDeque::new(),
                partial: String::new(),
            })),
        })
    }

    /// Path of the active log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Most recent complete lines, oldest first
    pub fn recent_lines(&self) -> Vec<String> {
        match self.state.lock() {
            Ok(state) => state.recent.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().recent.iter().cloned().collect(),
        }
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&self, state: &mut WriterState) -> io::Result<()> {
        state.file.flush()?;
        if self.options.max_files == 0 {
            state.file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
            state.written = 0;
            return Ok(());
        }

        let oldest = self.rotated_path(self.options.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.options.max_files).rev() {
            let from = self.rotated_path(index);
            if from.exists() {
                fs::rename(&from, self.rotated_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.rotated_path(1))?;

        state.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        state.written = 0;
        Ok(())
    }

    fn remember(&self, state: &mut WriterState, buf: &[u8]) {
        state.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = state.partial.find('\n') {
            let line: String = state.partial.drain(..=pos).collect();
            state.recent.push_back(line.trim_end().to_string());
            while state.recent.len() > self.options.buffer_lines {
                state.recent.pop_front();
            }
        }
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;

        if state.written + buf.len() as u64 > self.options.max_file_bytes && state.written > 0 {
            self.rotate(&mut state)?;
        }

        state.file.write_all(buf)?;
        state.written += buf.len() as u64;
        self.remember(&mut state, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer poisoned"))?;
        state.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initialize the global logger with default limits
pub fn init_logger(log_dir: PathBuf, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerOptions::default())
}

/// Initialize the global logger
///
/// Can only succeed once per process.
pub fn init_logger_with(log_dir: PathBuf, app_name: &str, options: LoggerOptions) -> Result<(), LoggerError> {
    if LOGGER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }

    let writer = RollingWriter::open(&log_dir, app_name, options)?;

    tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| LoggerError::Subscriber(e.to_string()))?;

    LOGGER.set(writer).map_err(|_| LoggerError::AlreadyInitialized)?;

    tracing::info!(
        started_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        "{} logger ready",
        app_name
    );
    Ok(())
}

fn ensure_initialized() -> Result<(), LoggerError> {
    ensure_initialized_in(&LOGGER)
}

fn ensure_initialized_in(cell: &OnceLock<RollingWriter>) -> Result<(), LoggerError> {
    cell.get().map(|_| ()).ok_or(LoggerError::NotInitialized)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::error!("{}", msg);
    Ok(())
}

/// Recent lines from the global logger (empty before init)
pub fn recent_lines() -> Vec<String> {
    LOGGER.get().map(|w| w.recent_lines()).unwrap_or_default()
}

/// Active log file of the global logger
pub fn log_file() -> Option<PathBuf> {
    LOGGER.get().map(|w| w.path().to_path_buf())
}
