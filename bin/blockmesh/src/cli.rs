//! CLI definition and entrypoint to executable

use crate::{
    args::LogArgs,
    commands::{config, nodes, sync},
    runner::CliRunner,
};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use tracing::info;

/// Parse CLI options, set up logging and run the chosen command.
pub fn run() -> eyre::Result<()> {
    Cli::parse().run()
}

/// The main blockmesh cli interface.
///
/// This is the entrypoint to the executable.
#[derive(Debug, Parser)]
#[command(author, version, about = "blockmesh", long_about = None)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    logs: LogArgs,
}

impl Cli {
    /// Parsers only the default CLI arguments from the given iterator
    pub fn try_parse_args_from<I, T>(itr: I) -> Result<Self, clap::error::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(itr)
    }

    /// Execute the configured cli command.
    pub fn run(self) -> eyre::Result<()> {
        let _handle = self.logs.init_tracing()?;
        if let Some(dir) = &self.logs.log_file_directory {
            info!(
                target: "blockmesh::cli",
                "Initialized tracing, debug log directory: {}",
                dir.display()
            );
        }

        let runner = CliRunner::try_default_runtime()?;
        match self.command {
            Commands::Sync(command) => runner.run_command_until_exit(|ctx| command.execute(ctx)),
            Commands::Nodes(command) => runner.run_command_until_exit(|ctx| command.execute(ctx)),
            Commands::Config(command) => runner.run_command_until_exit(|_| command.execute()),
        }
    }
}

/// Commands to be executed
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync blocks from the configured nodes into storage
    #[command(name = "sync")]
    Sync(sync::Command),
    /// Probe the configured nodes and print their health
    #[command(name = "nodes")]
    Nodes(nodes::Command),
    /// Write config to stdout
    #[command(name = "config")]
    Config(config::Command),
}
