use crate::formatter::LogFormat;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Directive, EnvFilter, Layer, Registry};

/// A boxed tracing [Layer].
pub(crate) type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Guard that flushes the non-blocking file writer when dropped.
pub type FileWorkerGuard = WorkerGuard;

/// Default targets that are too chatty at DEBUG.
const DEFAULT_ENV_FILTER_DIRECTIVES: [&str; 3] =
    ["hyper=off", "jsonrpsee=off", "sled=warn"];

/// Collects the layers handed to the registry.
#[derive(Default)]
pub(crate) struct Layers {
    inner: Vec<BoxedLayer<Registry>>,
}

impl Layers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_inner(self) -> Vec<BoxedLayer<Registry>> {
        self.inner
    }

    pub(crate) fn stdout(
        &mut self,
        format: LogFormat,
        default_directive: &str,
        filters: &str,
        color: Option<String>,
    ) -> eyre::Result<()> {
        let filter = build_env_filter(Some(default_directive.parse()?), filters)?;
        self.inner.push(format.layer(filter, color, None));
        Ok(())
    }

    pub(crate) fn file(
        &mut self,
        format: LogFormat,
        default_directive: &str,
        filters: &str,
        file_info: FileInfo,
    ) -> eyre::Result<FileWorkerGuard> {
        let (writer, guard) = file_info.create_log_writer()?;
        let filter = build_env_filter(Some(default_directive.parse()?), filters)?;
        self.inner.push(format.layer(filter, None, Some(writer)));
        Ok(guard)
    }
}

/// Where and how file logs are written.
#[derive(Debug, Clone)]
pub struct FileInfo {
    dir: PathBuf,
    file_name: String,
}

impl FileInfo {
    /// Daily rolling files named `<file_name>.<date>` inside `dir`.
    pub fn new(dir: PathBuf, file_name: String) -> Self {
        Self { dir, file_name }
    }

    fn create_log_writer(
        &self,
    ) -> eyre::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.dir)?;
        let appender = tracing_appender::rolling::daily(&self.dir, &self.file_name);
        Ok(tracing_appender::non_blocking(appender))
    }
}

/// Builds an [`EnvFilter`] from `RUST_LOG` or the given directives.
///
/// Comma-separated `directives` are added on top of the defaults that silence the transport
/// and database crates.
pub(crate) fn build_env_filter(
    default_directive: Option<Directive>,
    directives: &str,
) -> eyre::Result<EnvFilter> {
    let env_filter = if let Some(default_directive) = default_directive {
        EnvFilter::builder().with_default_directive(default_directive).from_env_lossy()
    } else {
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy()
    };

    DEFAULT_ENV_FILTER_DIRECTIVES
        .into_iter()
        .chain(directives.split(',').filter(|d| !d.is_empty()))
        .try_fold(env_filter, |env_filter, directive| {
            Ok::<_, eyre::Report>(env_filter.add_directive(directive.parse()?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extra_directives() {
        assert!(build_env_filter(None, "mesh=debug,sync::engine=trace").is_ok());
        assert!(build_env_filter(Some(LevelFilter::WARN.into()), "").is_ok());
        assert!(build_env_filter(None, "mesh=notalevel").is_err());
    }

    #[test]
    fn collects_stdout_and_file_layers() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let mut layers = Layers::new();
        assert!(layers.stdout(LogFormat::Terminal, "info", "sync=trace", None).is_ok());
        assert!(layers.stdout(LogFormat::Terminal, "mesh=notalevel", "", None).is_err());
        let file_info = FileInfo::new(logs.clone(), "blockmesh.log".into());
        let _guard = layers.file(LogFormat::Json, "debug", "", file_info).unwrap();
        assert!(logs.is_dir());
        assert_eq!(layers.into_inner().len(), 2);
    }
}
