//! Log output for the `trigger` binary.
//!
//! The binary picks a [`LogFormat`] and a verbosity from its flags. Without
//! `RUST_LOG`, the dispatch crates log at `info` (or `debug` when verbose)
//! while the HTTP and runtime dependencies stay at `warn`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events belong to a trigger run.
const TRIGGER_TARGETS: &[&str] = &["trigger", "trigger_core", "trigger_state"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// How the binary wants its logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    pub verbose: bool,
}

impl TelemetryConfig {
    pub fn new(json: bool, verbose: bool) -> Self {
        Self {
            format: if json { LogFormat::Json } else { LogFormat::Text },
            verbose,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        let level = if self.verbose { "debug" } else { "info" };
        let mut directives = vec!["warn".to_string()];
        directives.extend(
            TRIGGER_TARGETS
                .iter()
                .map(|target| format!("{target}={level}")),
        );
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directives()))
    }
}

/// Install the process-wide subscriber. A second call leaves the first in place.
pub fn init_tracing(config: TelemetryConfig) {
    let registry = tracing_subscriber::registry().with(config.filter());
    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_config() {
        assert_eq!(TelemetryConfig::new(true, false).format, LogFormat::Json);
        assert_eq!(TelemetryConfig::new(false, true).format, LogFormat::Text);
        assert_eq!(TelemetryConfig::default(), TelemetryConfig::new(false, false));
    }

    #[test]
    fn dependencies_stay_quiet_by_default() {
        assert_eq!(
            TelemetryConfig::new(false, false).default_directives(),
            "warn,trigger=info,trigger_core=info,trigger_state=info"
        );
        assert_eq!(
            TelemetryConfig::new(true, true).default_directives(),
            "warn,trigger=debug,trigger_core=debug,trigger_state=debug"
        );
    }

    #[test]
    fn default_directives_parse() {
        for verbose in [false, true] {
            let directives = TelemetryConfig::new(false, verbose).default_directives();
            assert!(EnvFilter::try_new(&directives).is_ok(), "{directives}");
        }
    }
}
