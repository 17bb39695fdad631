//! Logging setup for blockmesh.
//!
//! [`BlockmeshTracer`] installs the global subscriber: one stdout layer and, when configured, a
//! daily rolling file layer. Each layer carries its own [`LogFormat`] and filter directives.
//!
//! ```
//! use blockmesh_tracing::{BlockmeshTracer, LayerInfo, LogFormat};
//!
//! fn main() -> eyre::Result<()> {
//!     let _handle = BlockmeshTracer::new()
//!         .with_stdout(LayerInfo::new(LogFormat::Json, "info".into(), "mesh=debug".into(), None))
//!         .init()?;
//!     Ok(())
//! }
//! ```

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use tracing;

pub use formatter::LogFormat;
pub use layers::{FileInfo, FileWorkerGuard};

mod formatter;
mod layers;

use crate::layers::Layers;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Builder for the global subscriber.
#[derive(Debug, Clone, Default)]
pub struct BlockmeshTracer {
    stdout: LayerInfo,
    file: Option<(LayerInfo, FileInfo)>,
}

impl BlockmeshTracer {
    /// Stdout in terminal format at INFO, no file output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stdout layer settings.
    pub fn with_stdout(mut self, config: LayerInfo) -> Self {
        self.stdout = config;
        self
    }

    /// Also writes logs to rolling files.
    pub fn with_file(mut self, config: LayerInfo, file_info: FileInfo) -> Self {
        self.file = Some((config, file_info));
        self
    }

    /// Installs the subscriber.
    ///
    /// Keep the returned handle alive, file logs are flushed when it drops. If a global
    /// subscriber is already set this only logs a warning.
    pub fn init(self) -> eyre::Result<TracerHandle> {
        let mut layers = Layers::new();
        let stdout = self.stdout;
        layers.stdout(stdout.format, &stdout.default_directive, &stdout.filters, stdout.color)?;

        let file_guard = match self.file {
            Some((config, file_info)) => Some(layers.file(
                config.format,
                &config.default_directive,
                &config.filters,
                file_info,
            )?),
            None => None,
        };

        if let Err(err) = tracing_subscriber::registry().with(layers.into_inner()).try_init() {
            tracing::warn!(%err, "Tracing subscriber already installed");
        }
        Ok(TracerHandle { file_guard })
    }
}

/// Settings of a single layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    format: LogFormat,
    default_directive: String,
    filters: String,
    color: Option<String>,
}

impl LayerInfo {
    /// `default_directive` applies when `RUST_LOG` is unset, `filters` are comma-separated
    /// directives added on top. `color` is one of `always`, `auto` or `never`, `None` disables
    /// ANSI output.
    pub const fn new(
        format: LogFormat,
        default_directive: String,
        filters: String,
        color: Option<String>,
    ) -> Self {
        Self { format, default_directive, filters, color }
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            default_directive: LevelFilter::INFO.to_string(),
            filters: String::new(),
            color: Some("always".to_string()),
        }
    }
}

/// Keeps the file writer alive.
#[derive(Debug, Default)]
pub struct TracerHandle {
    /// Flushes file logs on drop.
    pub file_guard: Option<FileWorkerGuard>,
}

/// Installs a subscriber writing to the test harness, filtered by `RUST_LOG`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
