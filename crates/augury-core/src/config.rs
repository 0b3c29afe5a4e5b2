//! Diagnostic output configuration.
//!
//! Verbosity is set via the `AUGURY_DEBUG` environment variable:
//! - unset or falsey (default): verdict tags only. Failure reasons are
//!   suppressed so diagnostic text never leaks into deterministic output.
//! - truthy (`1`, `true`, `on`, `yes`, `debug`): verdicts print with their
//!   failure reason attached.

use std::sync::OnceLock;

/// Diagnostic verbosity for verdict sinks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugMode {
    /// Verdict tags only.
    #[default]
    Quiet,
    /// Verdict tags with failure reasons.
    Verbose,
}

impl DebugMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" | "debug" | "verbose" => Self::Verbose,
            _ => Self::Quiet,
        }
    }

    /// Returns true if failure reasons should be printed.
    #[must_use]
    pub const fn reasons_enabled(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

static GLOBAL_MODE: OnceLock<DebugMode> = OnceLock::new();

/// Get the configured debug mode (reads env var on first call, caches thereafter).
#[must_use]
pub fn debug_mode() -> DebugMode {
    *GLOBAL_MODE.get_or_init(|| {
        std::env::var("AUGURY_DEBUG")
            .map(|v| DebugMode::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// True when verdict sinks should include failure reasons.
#[must_use]
pub fn debug_enabled() -> bool {
    debug_mode().reasons_enabled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_debug_modes() {
        assert_eq!(DebugMode::from_str_loose("1"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("true"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("TRUE"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("on"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("yes"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("debug"), DebugMode::Verbose);
        assert_eq!(DebugMode::from_str_loose("0"), DebugMode::Quiet);
        assert_eq!(DebugMode::from_str_loose("off"), DebugMode::Quiet);
        assert_eq!(DebugMode::from_str_loose("bogus"), DebugMode::Quiet);
        assert_eq!(DebugMode::from_str_loose(""), DebugMode::Quiet);
    }

    #[test]
    fn default_is_quiet() {
        assert_eq!(DebugMode::default(), DebugMode::Quiet);
        assert!(!DebugMode::Quiet.reasons_enabled());
        assert!(DebugMode::Verbose.reasons_enabled());
    }
}
