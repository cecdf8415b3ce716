use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use pod_memory::{
    config::{Cli, Command, Config, NodeArgs},
    driver::Driver,
    network::TcpNetwork,
    node::{Node, NodeOptions},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cmd = cli.command.clone().unwrap_or(Command::Run);

    match cmd {
        Command::Run => run(cli.config).await,
        Command::Node(args) => run_node(args).await,
    }
}

async fn run(config: Config) -> Result<()> {
    let spec = config.conn_spec();
    let driver = Driver::new(config.network()).with_options(config.conn_options());
    info!(
        driver = driver.name(),
        version = driver.version(),
        network = driver.network().name(),
        namespace = %spec.namespace,
        name = %spec.name,
        "starting"
    );

    let conn = driver
        .connect(&spec)
        .await
        .with_context(|| format!("connect {}", spec.host()))?;
    if let Some(protocol) = conn.protocol().config() {
        for partition in protocol.partitions {
            info!(
                partition_id = partition.partition_id,
                leader = %partition.leader,
                "partition ready"
            );
        }
    }

    shutdown_signal().await;
    info!("shutting down");
    conn.close().await.context("close connection")?;
    Ok(())
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let network = Arc::new(TcpNetwork::new(args.bind.ip()));
    let mut node = Node::new(
        network,
        NodeOptions::new(args.bind.ip().to_string(), args.bind.port()),
    );
    node.start().await.context("start storage node")?;

    shutdown_signal().await;
    node.stop().await.context("stop storage node")?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
