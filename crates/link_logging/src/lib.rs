#![deny(missing_docs)]
//! Shared logging utilities for the sheetlink workspace.
//!
//! This crate provides the `link_*` logging macros used by the resolver,
//! downloader and invocation service, plus a minimal initializer for tests.

use std::cell::Cell;

thread_local! {
    /// Correlation id of the invocation currently running on this thread.
    static INVOCATION_ID: Cell<u64> = const { Cell::new(0) };
}

/// Sets the invocation id for the current thread.
/// Called by the service once per handled invocation.
pub fn set_invocation_id(id: u64) {
    INVOCATION_ID.with(|v| v.set(id));
}

/// Retrieves the invocation id for the current thread.
/// Returns 0 outside of an invocation.
pub fn invocation_id() -> u64 {
    INVOCATION_ID.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current invocation id.
#[macro_export]
macro_rules! link_trace {
    ($($arg:tt)*) => {{
        log::trace!("[inv {}] {}", $crate::invocation_id(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current invocation id.
#[macro_export]
macro_rules! link_debug {
    ($($arg:tt)*) => {{
        log::debug!("[inv {}] {}", $crate::invocation_id(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current invocation id.
#[macro_export]
macro_rules! link_info {
    ($($arg:tt)*) => {{
        log::info!("[inv {}] {}", $crate::invocation_id(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current invocation id.
#[macro_export]
macro_rules! link_warn {
    ($($arg:tt)*) => {{
        log::warn!("[inv {}] {}", $crate::invocation_id(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current invocation id.
#[macro_export]
macro_rules! link_error {
    ($($arg:tt)*) => {{
        log::error!("[inv {}] {}", $crate::invocation_id(), format_args!($($arg)*));
    }};
}

/// Initializes a stderr logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test binary thread may have won the race already.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Never,
    )]);
}
