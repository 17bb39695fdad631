use crate::layers::BoxedLayer;
use clap::ValueEnum;
use std::fmt;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format of a log layer.
#[derive(Debug, Copy, Clone, ValueEnum, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per record.
    Json,
    /// Human-readable lines.
    Terminal,
}

impl LogFormat {
    /// Builds a layer writing to `file_writer`, or to stdout if there is none.
    pub(crate) fn layer(
        self,
        filter: EnvFilter,
        color: Option<String>,
        file_writer: Option<NonBlocking>,
    ) -> BoxedLayer<Registry> {
        let ansi = use_ansi(color.as_deref(), std::env::var("RUST_LOG_STYLE").ok().as_deref());
        let target = show_target(&filter, std::env::var("RUST_LOG_TARGET").ok().as_deref());
        let fmt = tracing_subscriber::fmt::layer().with_ansi(ansi).with_target(target);

        match (self, file_writer) {
            (Self::Json, Some(writer)) => {
                fmt.json().with_writer(writer).with_filter(filter).boxed()
            }
            (Self::Json, None) => fmt.json().with_filter(filter).boxed(),
            (Self::Terminal, Some(writer)) => fmt.with_writer(writer).with_filter(filter).boxed(),
            (Self::Terminal, None) => fmt.with_filter(filter).boxed(),
        }
    }
}

/// `RUST_LOG_STYLE` wins over the configured color, a layer without color never uses ANSI.
fn use_ansi(color: Option<&str>, style: Option<&str>) -> bool {
    match color {
        Some(color) => style.unwrap_or(color) != "never",
        None => false,
    }
}

/// Targets such as `mesh::benchmark` are only shown below INFO unless `RUST_LOG_TARGET` says
/// otherwise.
fn show_target(filter: &EnvFilter, env: Option<&str>) -> bool {
    match env {
        Some(val) => val != "0",
        None => filter.max_level_hint().map_or(true, |max| max > tracing::Level::INFO),
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Terminal => f.write_str("terminal"),
        }
    }
}
