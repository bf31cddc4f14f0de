//! Logging initialization and configuration
//!
//! Logs go to stderr in every format; stdout is reserved for command output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    #[default]
    Pretty,
    /// JSON lines for log aggregation
    Json,
    /// Single-line compact output
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        }
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            Self::Pretty => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            Self::Json => fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stderr)
                .boxed(),
            Self::Compact => fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

/// Initialize the global subscriber with the default level
///
/// # Example
///
/// ```ignore
/// use observability::{init_logging, LogFormat};
///
/// init_logging("carmatch", LogFormat::Json)?;
/// tracing::info!("Service started");
/// ```
pub fn init_logging(service_name: &str, format: LogFormat) -> anyhow::Result<()> {
    init_logging_with_default(service_name, format, DEFAULT_DIRECTIVE)
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `default_directive`. Fails if a global subscriber
/// is already installed.
pub fn init_logging_with_default(
    service_name: &str,
    format: LogFormat,
    default_directive: &str,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    // the filter is applied per layer so the boxed layer stays `Layer<Registry>`
    tracing_subscriber::registry()
        .with(format.layer().with_filter(env_filter))
        .try_init()?;

    tracing::debug!(
        service = service_name,
        format = format.as_str(),
        "Logging initialized"
    );

    Ok(())
}
