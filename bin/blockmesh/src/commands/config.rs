//! CLI command to show configs.

use crate::args::NodeArgs;
use clap::Args;
use eyre::WrapErr;
use std::path::PathBuf;

/// `blockmesh config` command
#[derive(Debug, Clone, Args)]
pub struct Command {
    #[command(flatten)]
    nodes: NodeArgs,

    /// Show the default config instead of the loaded one.
    #[arg(long, conflicts_with = "config")]
    default: bool,

    /// Write the config to this path instead of printing it.
    #[arg(long, value_name = "FILE")]
    write: Option<PathBuf>,
}

impl Command {
    /// Execute `config` command
    pub async fn execute(self) -> eyre::Result<()> {
        let config = if self.default { Default::default() } else { self.nodes.load_config()? };

        match &self.write {
            Some(path) => config
                .save(path)
                .wrap_err_with(|| format!("could not write config to {}", path.display()))?,
            None => {
                let toml = toml::to_string_pretty(&config).wrap_err("could not serialize config")?;
                println!("{toml}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockmesh_config::Config;
    use clap::Parser;

    #[derive(Parser)]
    struct CommandParser<T: Args> {
        #[command(flatten)]
        args: T,
    }

    #[tokio::test]
    async fn writes_effective_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        let command = CommandParser::<Command>::parse_from([
            "blockmesh",
            "--node",
            "http://a:10332",
            "--write",
            path.to_str().unwrap(),
        ])
        .args;
        command.execute().await.unwrap();

        let written = Config::load(&path).unwrap();
        assert_eq!(written.nodes.endpoints, vec!["http://a:10332"]);
    }

    #[test]
    fn default_conflicts_with_config_file() {
        let res = CommandParser::<Command>::try_parse_from([
            "blockmesh",
            "--default",
            "--config",
            "blockmesh.toml",
        ]);
        assert!(res.is_err());
    }
}
