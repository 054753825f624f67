#![deny(missing_docs)]
//! Shared logging utilities for the tracker workspace.
//!
//! Every crate logs through the `tracker_*` macros below so that all output
//! lands under a single target and can be filtered as one unit. Binaries set up
//! the concrete logger; tests call [`initialize_for_tests`].

use log::LevelFilter;

/// Log target used by every `tracker_*` macro.
pub const TARGET: &str = "provision";

/// Logs a trace-level message under the tracker target.
#[macro_export]
macro_rules! tracker_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the tracker target.
#[macro_export]
macro_rules! tracker_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the tracker target.
#[macro_export]
macro_rules! tracker_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the tracker target.
#[macro_export]
macro_rules! tracker_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the tracker target.
#[macro_export]
macro_rules! tracker_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Parses a textual level (`"off"`, `"error"`, ..., `"trace"`), case-insensitively.
///
/// Returns `None` for anything else so callers can fall back to their default.
pub fn parse_level(text: &str) -> Option<LevelFilter> {
    text.trim().parse::<LevelFilter>().ok()
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_known_names() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
    }

    #[test]
    fn parse_level_rejects_garbage() {
        assert_eq!(parse_level("loud"), None);
        assert_eq!(parse_level(""), None);
    }

    #[test]
    fn macros_expand_without_logger() {
        initialize_for_tests();
        tracker_trace!("trace {}", 1);
        tracker_debug!("debug {}", 2);
        tracker_info!("info");
        tracker_warn!("warn {value}", value = 3);
        tracker_error!("error");
    }
}
