//! Log subscriber installation.
//!
//! The proxy emits `tracing` events from every crate; [`init_tracing`]
//! wires them to stdout once at startup.
//!
//! ```ignore
//! use calproxy_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::service())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Targets that get the configured level when no filter is given.
const DEFAULT_TARGETS: &[&str] = &[
    "calproxy_core",
    "calproxy_providers",
    "calproxy_server",
    "tower_http",
];

#[derive(Debug, Error)]
pub enum TracingError {
    /// A subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    Pretty,
    Compact,
    /// Newline-delimited JSON.
    #[default]
    Json,
}

impl std::str::FromStr for TracingOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else if s.eq_ignore_ascii_case("compact") {
            Ok(Self::Compact)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(format!("unsupported log format: {s}"))
        }
    }
}

/// Subscriber settings. Start from [`TracingConfig::service`] or
/// [`TracingConfig::debug`] and adjust with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Adds file, line and span close timings to every record.
    pub verbose: bool,
    pub timestamps: bool,
    /// Explicit filter directive; wins over `RUST_LOG` and `level`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::service()
    }
}

impl TracingConfig {
    /// JSON at INFO, for running behind a log collector.
    #[must_use]
    pub fn service() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Json,
            verbose: false,
            timestamps: true,
            filter: None,
        }
    }

    /// Compact DEBUG output without timestamps.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: Level::DEBUG,
            format: TracingOutputFormat::Compact,
            verbose: true,
            timestamps: false,
            filter: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// `target=LEVEL` pairs for each proxy crate.
    pub fn default_directive(&self) -> String {
        let pairs: Vec<String> = DEFAULT_TARGETS
            .iter()
            .map(|target| format!("{target}={}", self.level))
            .collect();
        pairs.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(filter) = &self.filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.default_directive())?),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.verbose {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_file(self.verbose)
            .with_line_number(self.verbose)
            .with_span_events(spans);

        match (self.format, self.timestamps) {
            (TracingOutputFormat::Json, _) => base.json().with_current_span(true).boxed(),
            (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails when the filter directive does not parse or a subscriber is
/// already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.env_filter()?;
    let subscriber = tracing_subscriber::registry().with(config.fmt_layer().with_filter(filter));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
