//! Leveled logging for the `strata` workspace.
//!
//! A small, dependency-free logger shared by every `strata` crate. Messages are
//! filtered against a single global level, tagged with the module path of the
//! call site and written to stderr so they never interleave with benchmark
//! reports printed on stdout.
//!
//! The level starts at [`Level::Warn`]. Binaries usually call
//! [`init_from_env`] once at startup so the level can be raised without a
//! rebuild:
//!
//! ```
//! use strata_log::{debug, info, Level};
//!
//! strata_log::init_from_env("STRATA_LOG").unwrap();
//! strata_log::set_level(Level::Debug);
//!
//! let regions = 3;
//! info!("arena holds {} regions", regions);
//! debug!("region sizes: {:?}", [1024, 2048, 4096]);
//! ```

use std::fmt::{self, Arguments};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity of a log message.
///
/// Lower discriminants are more severe. A message is emitted when its level is
/// less than or equal to the configured level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Contract violations and failures.
    Error = 0,
    /// Suspicious but recoverable situations.
    Warn = 1,
    /// High-level progress.
    Info = 2,
    /// Growth and release events inside resources.
    Debug = 3,
    /// Per-allocation detail.
    Trace = 4,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 5] = [
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    const fn color_code(self) -> &'static str {
        match self {
            Level::Error => "\x1b[31m",
            Level::Warn => "\x1b[33m",
            Level::Info => "\x1b[32m",
            Level::Debug => "\x1b[36m",
            Level::Trace => "\x1b[35m",
        }
    }

    /// Upper-case name of the level, as printed in log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Error,
            1 => Level::Warn,
            2 => Level::Info,
            3 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`Level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {
    input: String,
}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid log level `{}` (expected error, warn, info, debug or trace)",
            self.input
        )
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses a level name, ignoring ASCII case.
    ///
    /// ```
    /// use strata_log::Level;
    ///
    /// assert_eq!("debug".parse::<Level>(), Ok(Level::Debug));
    /// assert_eq!("WARN".parse::<Level>(), Ok(Level::Warn));
    /// assert!("verbose".parse::<Level>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLevelError {
                input: s.to_owned(),
            })
    }
}

/// Global level filter.
///
/// Stored as an atomic so the macros can read it without locking, even
/// though the rest of the workspace is single-threaded.
pub struct Logger {
    level: AtomicU8,
}

impl Logger {
    const fn new(level: Level) -> Self {
        Logger {
            level: AtomicU8::new(level as u8),
        }
    }

    /// Sets the most verbose level that will be emitted.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Returns the most verbose level that will be emitted.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Returns `true` if a message at `level` passes the filter.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level as u8 <= self.level.load(Ordering::Relaxed)
    }
}

static LOGGER: Logger = Logger::new(Level::Warn);

/// Returns the global logger.
pub fn logger() -> &'static Logger {
    &LOGGER
}

/// Sets the global level.
pub fn set_level(level: Level) {
    LOGGER.set_level(level);
}

/// Returns the global level.
pub fn level() -> Level {
    LOGGER.level()
}

/// Returns `true` if a message at `level` would be emitted.
///
/// Useful to skip work that only feeds a log line.
#[inline]
pub fn enabled(level: Level) -> bool {
    LOGGER.enabled(level)
}

/// Reads the level from the environment variable `var`.
///
/// Returns `Ok(Some(level))` when the variable is set and valid, `Ok(None)`
/// when it is unset (the current level is kept), and an error when it is set
/// to something that is not a level name.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable holds an unknown level.
pub fn init_from_env(var: &str) -> Result<Option<Level>, ParseLevelError> {
    match std::env::var(var) {
        Ok(value) => {
            let level = value.parse::<Level>()?;
            set_level(level);
            Ok(Some(level))
        }
        Err(_) => Ok(None),
    }
}

#[doc(hidden)]
pub fn __write(level: Level, target: &str, args: Arguments<'_>) {
    const RESET: &str = "\x1b[0m";

    if !LOGGER.enabled(level) {
        return;
    }

    eprintln!("{}[{}]{RESET} {target}: {args}", level.color_code(), level);
}

/// Logs at an explicit level.
///
/// ```
/// use strata_log::{log, Level};
///
/// log!(level: Level::Info, "installed {} as active resource", "pool");
/// ```
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $crate::enabled(level) {
            $crate::__write(level, module_path!(), format_args!($($arg)*));
        }
    }};
}

/// Logs at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Error, $($arg)*)
    };
}

/// Logs at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Warn, $($arg)*)
    };
}

/// Logs at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Info, $($arg)*)
    };
}

/// Logs at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Debug, $($arg)*)
    };
}

/// Logs at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log!(level: $crate::Level::Trace, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn test_level_parse_ignores_case_and_whitespace() {
        assert_eq!("error".parse::<Level>(), Ok(Level::Error));
        assert_eq!(" Info ".parse::<Level>(), Ok(Level::Info));
        assert_eq!("TRACE".parse::<Level>(), Ok(Level::Trace));
    }

    #[test]
    fn test_level_parse_error_names_input() {
        let err = "loud".parse::<Level>().unwrap_err();
        assert!(err.to_string().contains("`loud`"));
    }

    #[test]
    fn test_level_display_round_trips() {
        for level in Level::ALL {
            assert_eq!(level.to_string().parse::<Level>(), Ok(level));
        }
    }

    #[test]
    fn test_logger_filtering() {
        let logger = Logger::new(Level::Info);

        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Info));
        assert!(!logger.enabled(Level::Debug));

        logger.set_level(Level::Trace);
        assert!(logger.enabled(Level::Trace));
        assert_eq!(logger.level(), Level::Trace);
    }

    #[test]
    fn test_init_from_unset_env_keeps_level() {
        let before = level();
        let result = init_from_env("STRATA_LOG_TEST_SURELY_UNSET");
        assert_eq!(result, Ok(None));
        assert_eq!(level(), before);
    }

    #[test]
    fn test_macros_expand() {
        error!("error {}", 1);
        warn!("warn {}", 2);
        info!("info");
        debug!("debug {:?}", [1, 2]);
        trace!("trace");
    }
}
