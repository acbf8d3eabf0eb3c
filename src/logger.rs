//! Structured logging for the workers platform
//!
//! Tag-based logging with standard levels, colored console output and an
//! optional append-mode file sink (used by worker processes so the
//! supervisor's per-worker log files capture everything).
//!
//! ```rust
//! use plataforma_workers::logger::{self, LogTag};
//!
//! logger::init();
//! logger::info(LogTag::Bus, "Subscribed to invitation_queue");
//! logger::error(LogTag::Telegram, "FLOOD_WAIT of 30s");
//! ```

use chrono::Local;
use colored::*;
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Module tags so each subsystem is identifiable in interleaved output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Supervisor,
    Bus,
    Consumer,
    Action,
    Telegram,
    Backend,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Supervisor => "SUPERVISOR",
            LogTag::Bus => "BUS",
            LogTag::Consumer => "CONSUMER",
            LogTag::Action => "ACTION",
            LogTag::Telegram => "TELEGRAM",
            LogTag::Backend => "BACKEND",
        }
    }

    fn colored(&self) -> ColoredString {
        match self {
            LogTag::System => self.as_str().green().bold(),
            LogTag::Supervisor => self.as_str().magenta().bold(),
            LogTag::Bus => self.as_str().cyan().bold(),
            LogTag::Consumer => self.as_str().blue().bold(),
            LogTag::Action => self.as_str().yellow().bold(),
            LogTag::Telegram => self.as_str().bright_blue().bold(),
            LogTag::Backend => self.as_str().bright_green().bold(),
        }
    }
}

/// Levels ordered by severity (Error < Warning < Info < Debug)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn from_env_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

static MIN_LEVEL: Lazy<Mutex<LogLevel>> = Lazy::new(|| Mutex::new(LogLevel::Info));
static FILE_SINK: Lazy<Mutex<Option<File>>> = Lazy::new(|| Mutex::new(None));

/// Initialize the logger. Reads `LOG_LEVEL` from the environment
/// (error/warning/info/debug); defaults to info.
pub fn init() {
    if let Ok(raw) = std::env::var("LOG_LEVEL") {
        if let Some(level) = LogLevel::from_env_str(&raw) {
            if let Ok(mut min) = MIN_LEVEL.lock() {
                *min = level;
            }
        }
    }
}

/// Attach an append-mode file sink; every log line is mirrored into it.
pub fn init_file_sink(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Ok(mut sink) = FILE_SINK.lock() {
        *sink = Some(file);
    }
    Ok(())
}

pub fn error(tag: LogTag, message: &str) {
    log(tag, LogLevel::Error, message);
}

pub fn warning(tag: LogTag, message: &str) {
    log(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    log(tag, LogLevel::Info, message);
}

/// Only shown with LOG_LEVEL=debug
pub fn debug(tag: LogTag, message: &str) {
    log(tag, LogLevel::Debug, message);
}

fn should_log(level: LogLevel) -> bool {
    // Errors always log
    if level == LogLevel::Error {
        return true;
    }
    let min = MIN_LEVEL.lock().map(|l| *l).unwrap_or(LogLevel::Info);
    level <= min
}

fn log(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(level) {
        return;
    }

    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();

    let level_str = match level {
        LogLevel::Error => level.as_str().red().bold(),
        LogLevel::Warning => level.as_str().yellow().bold(),
        LogLevel::Info => level.as_str().normal(),
        LogLevel::Debug => level.as_str().dimmed(),
    };

    println!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag.colored(),
        level_str,
        message
    );
    let _ = io::stdout().flush();

    // Mirror to the file sink, plain text with a full timestamp
    if let Ok(mut sink) = FILE_SINK.lock() {
        if let Some(ref mut file) = *sink {
            let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
            let _ = writeln!(
                file,
                "{} [{}] [{}] {}",
                stamp,
                tag.as_str(),
                level.as_str(),
                message
            );
        }
    }
}
