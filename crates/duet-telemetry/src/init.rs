//! Logging setup for hosts embedding the auth stack.
//!
//! # Design
//! - The subscriber gets two levels: a host-wide level and a separate level for
//!   the duet crates, so token refresh and session transitions can be traced at
//!   `debug` while the host stays at `info`.
//! - `RUST_LOG` wins over both when set.
//! - Hosts and tests read `DUET_LOG_*` through [`LoggingConfig::with_env_overrides`]
//!   using the same lookup-closure shape as the auth configuration loader.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default host-wide level when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Tracing targets of the duet crates.
pub const AUTH_TARGETS: &[&str] = &[
    "duet_auth",
    "duet_http",
    "duet_store",
    "duet_config",
    "duet_events",
];

const ENV_PREFIX: &str = "DUET_LOG_";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Host-wide level (e.g., `info`, `warn`).
    pub level: String,
    /// Level for [`AUTH_TARGETS`]; `None` leaves them at `level`.
    pub auth_level: Option<String>,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            auth_level: None,
            format: LogFormat::infer(),
        }
    }
}

impl LoggingConfig {
    /// Apply `DUET_LOG_LEVEL`, `DUET_LOG_AUTH_LEVEL` and `DUET_LOG_FORMAT`
    /// from `lookup`. Blank values are ignored; an unknown format keeps the
    /// current one.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = read("LEVEL") {
            self.level = level;
        }
        if let Some(level) = read("AUTH_LEVEL") {
            self.auth_level = Some(level);
        }
        if let Some(format) = read("FORMAT").as_deref().and_then(LogFormat::parse) {
            self.format = format;
        }
        self
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Filter directives used when `RUST_LOG` is absent, e.g.
    /// `warn,duet_auth=debug,duet_http=debug,...`.
    #[must_use]
    pub fn directives(&self) -> String {
        let Some(auth_level) = self.auth_level.as_deref() else {
            return self.level.clone();
        };
        AUTH_TARGETS
            .iter()
            .fold(self.level.clone(), |mut directives, target| {
                directives.push(',');
                directives.push_str(target);
                directives.push('=');
                directives.push_str(auth_level);
                directives
            })
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse `json` or `pretty`, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the tracing subscriber cannot be installed (for example,
/// because another subscriber has already been set globally).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(&config.directives());
    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    installed.map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Install a subscriber that writes through the test harness capture, with the
/// duet crates at `debug`. Safe to call from every test; only the first call
/// in a process installs anything.
pub fn init_test_logging() {
    let config = LoggingConfig {
        level: "warn".to_string(),
        auth_level: Some("debug".to_string()),
        format: LogFormat::Pretty,
    }
    .with_process_env();
    let _ = tracing_subscriber::registry()
        .with(build_env_filter(&config.directives()))
        .with(fmt::layer().with_target(true).with_test_writer())
        .try_init();
}

fn build_env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}
