//! Native logging pipeline.
//!
//! Everything in the crate logs through the `log` facade. [`init`] installs
//! [`ScapeLogger`] as the process logger; [`configure`] then selects the
//! level and the outputs (console, file, in-memory overlay).

use crate::types::{LogLevel, LogOutput};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Number of lines retained for the overlay output.
pub const OVERLAY_CAPACITY: usize = 64;

/// File name used for the file output, inside the log directory.
pub const LOG_FILE_NAME: &str = "scapekit.log";

/// Fixed-capacity line buffer; the oldest line is evicted when full.
#[derive(Debug)]
pub struct OverlayBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    overflow_count: u32,
}

impl OverlayBuffer {
    pub const fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity,
            overflow_count: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            self.overflow_count = self.overflow_count.saturating_add(1);
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.overflow_count = self.overflow_count.saturating_add(1);
        }
        self.lines.push_back(line);
    }

    /// Lines oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.overflow_count = 0;
    }
}

struct LoggerState {
    outputs: LogOutput,
    directory: Option<PathBuf>,
    file: Option<File>,
    overlay: OverlayBuffer,
    network_warned: bool,
}

/// `log::Log` implementation backing the configurable outputs.
pub struct ScapeLogger {
    state: Mutex<LoggerState>,
}

impl ScapeLogger {
    const fn new() -> Self {
        Self {
            state: Mutex::new(LoggerState {
                outputs: LogOutput::CONSOLE,
                directory: None,
                file: None,
                overlay: OverlayBuffer::new(OVERLAY_CAPACITY),
                network_warned: false,
            }),
        }
    }

    fn write_line(&self, line: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if state.outputs.contains(LogOutput::CONSOLE) {
            eprintln!("{}", line);
        }

        if state.outputs.contains(LogOutput::FILE) {
            if state.file.is_none() {
                let dir = state.directory.clone().unwrap_or_else(std::env::temp_dir);
                match OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join(LOG_FILE_NAME))
                {
                    Ok(f) => state.file = Some(f),
                    Err(e) => {
                        eprintln!("scapekit: cannot open log file in {}: {}", dir.display(), e);
                        state.outputs.remove(LogOutput::FILE);
                    }
                }
            }
            let written = state.file.as_mut().map(|file| writeln!(file, "{}", line));
            if let Some(Err(e)) = written {
                eprintln!("scapekit: cannot write log file, file output disabled: {}", e);
                state.file = None;
                state.outputs.remove(LogOutput::FILE);
            }
        }

        if state.outputs.contains(LogOutput::OVERLAY) {
            state.overlay.push(line.to_string());
        }
    }
}

impl log::Log for ScapeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{:<5} [{}] {}", record.level(), record.target(), record.args());
        self.write_line(&line);
    }

    fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(file) = state.file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

static LOGGER: ScapeLogger = ScapeLogger::new();

/// Install [`ScapeLogger`] as the process logger.
///
/// Returns false if another logger was installed first; configuration
/// calls still succeed but only affect the level filter.
pub fn init() -> bool {
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(log::LevelFilter::Error);
            true
        }
        Err(_) => false,
    }
}

/// Select the level and outputs of the pipeline. Takes effect immediately.
pub fn configure(level: LogLevel, outputs: LogOutput) {
    log::set_max_level(level.to_level_filter());

    let warn_network = match LOGGER.state.lock() {
        Ok(mut state) => {
            if !outputs.contains(LogOutput::FILE) {
                state.file = None;
            }
            state.outputs = outputs;
            let warn = outputs.contains(LogOutput::NETWORK) && !state.network_warned;
            state.network_warned |= warn;
            warn
        }
        Err(_) => false,
    };

    if warn_network {
        log::warn!("Network log output is not implemented, ignoring");
    }
}

/// Directory the file output writes into. Reopens the file on next write.
pub fn set_directory(dir: Option<PathBuf>) {
    if let Ok(mut state) = LOGGER.state.lock() {
        if state.directory != dir {
            state.directory = dir;
            state.file = None;
        }
    }
}

/// Lines currently held by the overlay output, oldest first.
pub fn overlay_lines() -> Vec<String> {
    LOGGER
        .state
        .lock()
        .map(|state| state.overlay.lines())
        .unwrap_or_default()
}

/// Forward a host-originated log line into the pipeline, tagged with `tag`.
pub fn forward(level: LogLevel, tag: &str, message: &str) {
    if let Some(level) = level.to_level() {
        log::log!(target: tag, level, "{}", message);
    }
}
