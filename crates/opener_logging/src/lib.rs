#![deny(missing_docs)]
//! Shared logging utilities for the PDF opener workspace.
//!
//! This crate provides the `opener_*` logging macros used by the controller,
//! page bridge and control panel, and a minimal test initializer for the
//! global logger.

/// Prefix attached to log lines so the three execution contexts can be told
/// apart in a combined log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// The persistent background controller.
    Background,
    /// A content-script page bridge.
    Bridge,
    /// The control panel popup.
    Panel,
}

impl ExecutionContext {
    /// Short tag used as the log line prefix.
    pub fn tag(self) -> &'static str {
        match self {
            ExecutionContext::Background => "background",
            ExecutionContext::Bridge => "bridge",
            ExecutionContext::Panel => "panel",
        }
    }
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! opener_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! opener_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! opener_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! opener_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! opener_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
