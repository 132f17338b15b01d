//! Logger setup plus `log` wrappers that are silenced per module.
//!
//! A module opts in by declaring the flag and importing the wrappers from the
//! crate root:
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_debug, log_info};
//!
//! log_info!("session {id}: started");
//! ```

use env_logger::Env;

/// Environment variable that bumps the default filter to `debug`.
pub const DEBUG_ENV: &str = "PAGEVITALS_DEBUG";

/// Initialize `env_logger`. `RUST_LOG` wins when set; otherwise the default
/// is `info`, or `debug` when `PAGEVITALS_DEBUG` is `1`/`true`.
///
/// Safe to call more than once: later calls are no-ops.
pub fn init_logging() {
    let debug_mode = std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_filter = if debug_mode { "debug" } else { "info" };

    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}

/// `log::info!` when the calling module's `ENABLE_LOGS` const is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::debug!` when the calling module's `ENABLE_LOGS` const is true.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` const is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` when the calling module's `ENABLE_LOGS` const is true.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    const ENABLE_LOGS: bool = false;

    fn counted(calls: &Cell<u32>) -> u32 {
        calls.set(calls.get() + 1);
        calls.get()
    }

    #[test]
    fn test_disabled_module_skips_formatting() {
        let calls = Cell::new(0);
        crate::log_info!("{}", counted(&calls));
        crate::log_debug!("{}", counted(&calls));
        crate::log_warn!("{}", counted(&calls));
        crate::log_error!("{}", counted(&calls));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        super::init_logging();
        super::init_logging();
        log::info!("logging initialized");
    }
}
