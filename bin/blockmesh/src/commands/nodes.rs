//! Command that probes the configured nodes and prints their health.
use crate::{
    args::{build_mesh, NodeArgs},
    runner::CliContext,
};
use blockmesh_mesh::NodeStatus;
use clap::Args;
use std::{fmt::Write, time::Duration};
use tracing::warn;

/// Probe the configured nodes and print their health.
#[derive(Debug, Clone, Args)]
pub struct Command {
    #[command(flatten)]
    nodes: NodeArgs,

    /// How long to wait for the mesh to become ready before printing.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "10s",
        value_parser = humantime_serde::re::humantime::parse_duration
    )]
    timeout: Duration,
}

impl Command {
    /// Execute `nodes` command
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let CliContext { mut shutdown } = ctx;
        let config = self.nodes.load_config()?;
        config.validate()?;
        let mesh = build_mesh(&config)?;

        let mut ready = mesh.ready_listener();
        tokio::select! {
            _ = &mut shutdown => {},
            res = tokio::time::timeout(self.timeout, ready.wait()) => {
                if res.is_err() {
                    warn!(
                        target: "blockmesh::cli",
                        timeout = ?self.timeout,
                        "Mesh did not become ready"
                    );
                }
            },
        }

        print!("{}", render(&mesh.snapshot()));
        mesh.close();
        Ok(())
    }
}

/// Renders one row per node.
fn render(rows: &[NodeStatus]) -> String {
    let mut out = format!(
        "{:<40} {:<8} {:>10} {:>10} {:>8} {}\n",
        "ENDPOINT", "ACTIVE", "LATENCY", "HEIGHT", "PENDING", "USER AGENT"
    );
    for row in rows {
        let active = match row.health.is_active {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        };
        let latency = row
            .health
            .latency
            .map(|latency| format!("{}ms", latency.as_millis()))
            .unwrap_or_default();
        let height = row.health.block_height.map(|h| h.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<40} {:<8} {:>10} {:>10} {:>8} {}",
            row.endpoint,
            active,
            latency,
            height,
            row.pending_requests,
            row.health.user_agent.as_deref().unwrap_or_default(),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockmesh_node::NodeHealth;
    use clap::Parser;

    #[derive(Parser)]
    struct CommandParser<T: Args> {
        #[command(flatten)]
        args: T,
    }

    #[test]
    fn parses_timeouts() {
        let command = CommandParser::<Command>::parse_from(["blockmesh"]).args;
        assert_eq!(command.timeout, Duration::from_secs(10));

        let command =
            CommandParser::<Command>::parse_from(["blockmesh", "--timeout", "1m 30s"]).args;
        assert_eq!(command.timeout, Duration::from_secs(90));

        assert!(CommandParser::<Command>::try_parse_from(["blockmesh", "--timeout", "soon"])
            .is_err());
    }

    #[test]
    fn renders_rows() {
        let rows = vec![
            NodeStatus {
                endpoint: "http://a:10332".to_string(),
                health: NodeHealth {
                    is_active: Some(true),
                    latency: Some(Duration::from_millis(12)),
                    block_height: Some(100),
                    user_agent: Some("/Neo:2.10.3/".to_string()),
                    last_ping: None,
                },
                pending_requests: 1,
                is_benchmarking: false,
            },
            NodeStatus {
                endpoint: "http://b:10332".to_string(),
                health: NodeHealth::default(),
                pending_requests: 0,
                is_benchmarking: false,
            },
        ];
        let out = render(&rows);
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ENDPOINT"));
        assert!(lines[1].contains("yes"));
        assert!(lines[1].contains("12ms"));
        assert!(lines[1].ends_with("/Neo:2.10.3/"));
        assert!(lines[2].contains("unknown"));
    }
}
