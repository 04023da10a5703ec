//! Leveled logger handle passed to tables and operators
//!
//! Records always go to the `log` facade under the `tablekit` target. Callers
//! that want the messages themselves register a [`LogObserver`].

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a log record. Lower numbers are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Error = 1,
    Warning = 2,
    Info = 3,
    Debug = 4,
}

impl Level {
    /// Map the numeric level used by callers onto a `Level`
    pub fn from_int(level: i32) -> Self {
        match level {
            i32::MIN..=1 => Level::Error,
            2 => Level::Warning,
            3 => Level::Info,
            _ => Level::Debug,
        }
    }
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => log::Level::Error,
            Level::Warning => log::Level::Warn,
            Level::Info => log::Level::Info,
            Level::Debug => log::Level::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "ERROR"),
            Level::Warning => write!(f, "WARNING"),
            Level::Info => write!(f, "INFO"),
            Level::Debug => write!(f, "DEBUG"),
        }
    }
}

/// Receives every record logged through a [`Logger`] it is registered with.
pub trait LogObserver: Send + Sync {
    fn observe(&self, level: Level, routine: &str, message: &str);
}

/// Cloneable logger handle. Clones share their observers.
#[derive(Clone, Default)]
pub struct Logger {
    observers: Vec<Arc<dyn LogObserver>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logger with one observer already registered
    pub fn with_observer(observer: Arc<dyn LogObserver>) -> Self {
        let mut logger = Self::new();
        logger.register(observer);
        logger
    }

    pub fn register(&mut self, observer: Arc<dyn LogObserver>) {
        self.observers.push(observer);
    }

    pub fn log(&self, level: Level, routine: &str, message: impl fmt::Display) {
        let message = message.to_string();
        log::log!(target: "tablekit", level.into(), "{}: {}", routine, message);
        for observer in &self.observers {
            observer.observe(level, routine, &message);
        }
    }

    pub fn warn(&self, routine: &str, message: impl fmt::Display) {
        self.log(Level::Warning, routine, message);
    }

    pub fn info(&self, routine: &str, message: impl fmt::Display) {
        self.log(Level::Info, routine, message);
    }

    pub fn debug(&self, routine: &str, message: impl fmt::Display) {
        self.log(Level::Debug, routine, message);
    }
}

/// A logged record captured by [`CollectingObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub routine: String,
    pub message: String,
}

/// Observer that keeps every record in memory
#[derive(Debug, Default)]
pub struct CollectingObserver {
    records: Mutex<Vec<LogRecord>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records at `level` or more severe
    pub fn at_least(&self, level: Level) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level <= level)
            .collect()
    }
}

impl LogObserver for CollectingObserver {
    fn observe(&self, level: Level, routine: &str, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                routine: routine.to_string(),
                message: message.to_string(),
            });
        }
    }
}
