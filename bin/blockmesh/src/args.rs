//! Arguments shared by several commands.

use blockmesh_config::Config;
use blockmesh_mesh::Mesh;
use blockmesh_node::NodeHandle;
use blockmesh_tracing::{
    tracing::{level_filters::LevelFilter, Level},
    BlockmeshTracer, FileInfo, LayerInfo, LogFormat, TracerHandle,
};
use clap::{ArgAction, Args};
use eyre::WrapErr;
use std::path::PathBuf;

/// File name prefix of the rolling log files.
const LOG_FILE_NAME: &str = "blockmesh.log";

/// Where the config comes from and which nodes to talk to.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "Nodes")]
pub struct NodeArgs {
    /// The path to a TOML configuration file. Defaults are written there if it does not exist.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The RPC endpoint of a node. May be repeated, replaces the configured endpoints.
    #[arg(long = "node", value_name = "URL")]
    pub nodes: Vec<String>,
}

impl NodeArgs {
    /// Loads the config file, if any, and applies the overrides.
    pub fn load_config(&self) -> eyre::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .wrap_err_with(|| format!("could not load config from {}", path.display()))?,
            None => Config::default(),
        };
        if !self.nodes.is_empty() {
            config.nodes.endpoints.clone_from(&self.nodes);
        }
        Ok(config)
    }
}

/// Builds an RPC backed [`Mesh`] over the configured endpoints.
pub fn build_mesh(config: &Config) -> eyre::Result<Mesh> {
    let nodes = config
        .nodes
        .endpoints
        .iter()
        .map(|endpoint| {
            NodeHandle::rpc(endpoint.as_str(), config.nodes.request_timeout)
                .wrap_err_with(|| format!("invalid node endpoint {endpoint}"))
        })
        .collect::<eyre::Result<Vec<_>>>()?;
    Ok(Mesh::new(nodes, config.mesh)?)
}

/// Logging and verbosity options.
#[derive(Debug, Clone, Args)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// The format to use for logs written to stdout.
    #[arg(
        long = "log.stdout.format",
        value_name = "FORMAT",
        global = true,
        default_value_t = LogFormat::Terminal
    )]
    pub log_stdout_format: LogFormat,

    /// The filter to use for logs written to stdout, appended to the verbosity level.
    #[arg(long = "log.stdout.filter", value_name = "FILTER", global = true, default_value = "")]
    pub log_stdout_filter: String,

    /// The directory to write rolling log files to. File logging is off when unset.
    #[arg(long = "log.file.directory", value_name = "PATH", global = true)]
    pub log_file_directory: Option<PathBuf>,

    /// The format to use for logs written to the log file.
    #[arg(
        long = "log.file.format",
        value_name = "FORMAT",
        global = true,
        default_value_t = LogFormat::Terminal
    )]
    pub log_file_format: LogFormat,

    /// The filter to use for logs written to the log file.
    #[arg(long = "log.file.filter", value_name = "FILTER", global = true, default_value = "debug")]
    pub log_file_filter: String,

    /// Sets whether or not the formatter emits ANSI terminal escape codes for colors and other
    /// text formatting.
    #[arg(long, value_name = "COLOR", global = true, default_value = "always")]
    pub color: String,

    /// Set the minimum log level.
    ///
    /// -v      Errors
    /// -vv     Warnings
    /// -vvv    Info
    /// -vvvv   Debug
    /// -vvvvv  Traces (warning: very verbose!)
    #[arg(short, long, action = ArgAction::Count, global = true, default_value_t = 3, verbatim_doc_comment, help_heading = "Display")]
    pub verbosity: u8,

    /// Silence all log output.
    #[arg(long, alias = "silent", short = 'q', global = true, help_heading = "Display")]
    pub quiet: bool,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            log_stdout_format: LogFormat::Terminal,
            log_stdout_filter: String::new(),
            log_file_directory: None,
            log_file_format: LogFormat::Terminal,
            log_file_filter: "debug".to_string(),
            color: "always".to_string(),
            verbosity: 3,
            quiet: false,
        }
    }
}

impl LogArgs {
    /// The level corresponding to the verbosity flags.
    pub fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::OFF
        }
        let level = match self.verbosity.saturating_sub(1) {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        };
        level.into()
    }

    /// Installs the global subscriber.
    ///
    /// The returned handle must be kept alive for file logs to be flushed.
    pub fn init_tracing(&self) -> eyre::Result<TracerHandle> {
        let mut tracer = BlockmeshTracer::new().with_stdout(LayerInfo::new(
            self.log_stdout_format,
            self.level().to_string(),
            self.log_stdout_filter.clone(),
            Some(self.color.clone()),
        ));

        if let Some(dir) = &self.log_file_directory {
            tracer = tracer.with_file(
                LayerInfo::new(
                    self.log_file_format,
                    LevelFilter::DEBUG.to_string(),
                    self.log_file_filter.clone(),
                    None,
                ),
                FileInfo::new(dir.clone(), LOG_FILE_NAME.to_string()),
            );
        }

        tracer.init()
    }
}
