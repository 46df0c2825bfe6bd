//! Structured logging setup via tracing-subscriber.
//!
//! `QUEUECALL_LOG` takes an `EnvFilter` directive (e.g. `queuecall=debug`) and
//! wins over the configured level. Logs go to stderr; stdout belongs to the
//! board renderer.

use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a filter directive.
pub const LOG_FILTER_ENV: &str = "QUEUECALL_LOG";

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed (tests, embedding).
pub fn init_logging(level: &str, format: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init(),
        _ => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    result.is_ok()
}

/// Level after applying `-q` / `-v` flags to the configured level.
pub fn effective_level(configured: &str, quiet: bool, verbosity: u8) -> String {
    if quiet {
        return "warn".to_string();
    }
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn log_level_valid(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

pub fn log_format_valid(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_valid(level), "{level}");
        }
    }

    #[test]
    fn test_invalid_levels() {
        assert!(!log_level_valid("verbose"));
        assert!(!log_level_valid("INFO"));
        assert!(!log_level_valid(""));
    }

    #[test]
    fn test_formats() {
        assert!(log_format_valid("text"));
        assert!(log_format_valid("json"));
        assert!(!log_format_valid("xml"));
        assert!(!log_format_valid("JSON"));
    }

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("info", false, 0), "info");
        assert_eq!(effective_level("info", false, 1), "debug");
        assert_eq!(effective_level("error", false, 3), "trace");
        assert_eq!(effective_level("debug", true, 2), "warn");
    }

    #[test]
    fn test_second_init_is_rejected_not_panicking() {
        init_logging("info", "text");
        assert!(!init_logging("debug", "json"));
    }
}
