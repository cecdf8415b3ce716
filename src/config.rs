use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};

use crate::{
    driver::{ConnOptions, ConnSpec},
    network::{LocalNetwork, Network, TcpNetwork},
    protocol::ProtocolOptions,
};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// In-process registry of logical addresses backed by loopback sockets.
    Local,
    /// Real host sockets and DNS.
    Tcp,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pod-memory",
    about = "Embedded single-partition primitive storage",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the embedded node and connect to it (default).
    Run,

    /// Serve a bare storage node on a host address.
    Node(NodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "POD_MEMORY_NAMESPACE",
        value_name = "NAMESPACE",
        default_value = "default"
    )]
    pub namespace: String,

    #[arg(
        long,
        global = true,
        env = "POD_MEMORY_NAME",
        value_name = "NAME",
        default_value = "pod-memory"
    )]
    pub name: String,

    #[arg(
        long,
        global = true,
        env = "POD_MEMORY_PORT",
        value_name = "PORT",
        default_value_t = crate::driver::DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    #[arg(
        long,
        global = true,
        env = "POD_MEMORY_NETWORK",
        value_enum,
        default_value_t = NetworkKind::Local
    )]
    pub network: NetworkKind,

    /// Interface the tcp network binds on.
    #[arg(
        long,
        global = true,
        env = "POD_MEMORY_BIND_IP",
        value_name = "IP",
        default_value = "0.0.0.0"
    )]
    pub bind_ip: IpAddr,

    #[arg(
        long = "connect-timeout-secs",
        global = true,
        env = "POD_MEMORY_CONNECT_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    pub connect_timeout_secs: u64,

    #[arg(
        long = "request-timeout-secs",
        global = true,
        env = "POD_MEMORY_REQUEST_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..=300)
    )]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn conn_spec(&self) -> ConnSpec {
        ConnSpec::new(self.namespace.clone(), self.name.clone())
    }

    pub fn conn_options(&self) -> ConnOptions {
        ConnOptions {
            port: self.port,
            protocol: ProtocolOptions {
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            ..ConnOptions::default()
        }
    }

    pub fn network(&self) -> Arc<dyn Network> {
        match self.network {
            NetworkKind::Local => Arc::new(LocalNetwork::new()),
            NetworkKind::Tcp => Arc::new(TcpNetwork::new(self.bind_ip)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_flags_absent() {
        let cli = Cli::try_parse_from(["pod-memory"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config.namespace, "default");
        assert_eq!(cli.config.name, "pod-memory");
        assert_eq!(cli.config.port, 8080);
        assert_eq!(cli.config.network, NetworkKind::Local);
        assert_eq!(cli.config.bind_ip.to_string(), "0.0.0.0");
        assert_eq!(cli.config.connect_timeout_secs, 5);
        assert_eq!(cli.config.request_timeout_secs, 30);
    }

    #[test]
    fn conn_options_follow_flags() {
        let cli = Cli::try_parse_from([
            "pod-memory",
            "--namespace",
            "ns1",
            "--name",
            "store1",
            "--port",
            "9090",
            "--connect-timeout-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.config.conn_spec().host(), "store1.ns1");
        let options = cli.config.conn_options();
        assert_eq!(options.port, 9090);
        assert_eq!(options.partition_id, 1);
        assert_eq!(options.protocol.connect_timeout, Duration::from_secs(2));
        assert_eq!(options.protocol.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn network_flag_selects_provider() {
        let cli = Cli::try_parse_from(["pod-memory", "--network", "tcp"]).unwrap();
        assert_eq!(cli.config.network, NetworkKind::Tcp);
        assert_eq!(cli.config.network().name(), "tcp");

        let cli = Cli::try_parse_from(["pod-memory"]).unwrap();
        assert_eq!(cli.config.network().name(), "local");
    }

    #[test]
    fn node_subcommand_parses_bind() {
        let cli = Cli::try_parse_from(["pod-memory", "node", "--bind", "127.0.0.1:9000"]).unwrap();
        let Some(Command::Node(args)) = cli.command else {
            panic!("expected node command");
        };
        assert_eq!(args.bind.port(), 9000);
    }

    #[test]
    fn rejects_zero_port() {
        let err = Cli::try_parse_from(["pod-memory", "--port", "0"]).unwrap_err();
        assert!(err.to_string().contains("--port"));
    }

    #[test]
    fn rejects_invalid_connect_timeout_secs() {
        let err = Cli::try_parse_from(["pod-memory", "--connect-timeout-secs", "0"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--connect-timeout-secs"));
        assert!(msg.contains("1..=60"));
    }

    #[test]
    fn rejects_invalid_request_timeout_secs() {
        let err =
            Cli::try_parse_from(["pod-memory", "--request-timeout-secs", "301"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--request-timeout-secs"));
        assert!(msg.contains("1..=300"));
    }

    #[test]
    fn rejects_unknown_network() {
        let err = Cli::try_parse_from(["pod-memory", "--network", "carrier-pigeon"]).unwrap_err();
        assert!(err.to_string().contains("--network"));
    }
}
