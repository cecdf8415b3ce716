//! Storage node: serves the primitive state machines of its partitions over HTTP on a logical
//! address claimed from a [`Network`].

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{FutureExt as _, future::BoxFuture};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    network::{Address, Network, NetworkError, Registration},
    protocol::{DEFAULT_PARTITION_ID, PartitionId},
};

pub mod server;


pub use server::{NodeState, build_router};

/// How long `stop` waits for in-flight requests before aborting the server task.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOptions {
    pub host: String,
    pub port: u16,
    pub partitions: Vec<PartitionId>,
}

impl NodeOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            partitions: vec![DEFAULT_PARTITION_ID],
        }
    }

    pub fn with_partitions(mut self, partitions: impl IntoIterator<Item = PartitionId>) -> Self {
        self.partitions = partitions.into_iter().collect();
        self
    }

    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}

#[derive(Debug)]
pub enum NodeError {
    AlreadyStarted { address: Address },
    NoPartitions { address: Address },
    Bind(NetworkError),
    Io { address: Address, source: std::io::Error },
    Serve { address: Address, source: std::io::Error },
    Join { address: Address, source: tokio::task::JoinError },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyStarted { address } => write!(f, "node {address} is already started"),
            Self::NoPartitions { address } => write!(f, "node {address} hosts no partitions"),
            Self::Bind(e) => write!(f, "bind storage node: {e}"),
            Self::Io { address, source } => write!(f, "node {address} io error: {source}"),
            Self::Serve { address, source } => write!(f, "node {address} server error: {source}"),
            Self::Join { address, source } => write!(f, "node {address} server task: {source}"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind(e) => Some(e),
            Self::Io { source, .. } | Self::Serve { source, .. } => Some(source),
            Self::Join { source, .. } => Some(source),
            Self::AlreadyStarted { .. } | Self::NoPartitions { .. } => None,
        }
    }
}

/// Lifecycle of an embedded node as the connection coordinator drives it.
pub trait StorageNode: Send + Sync {
    fn address(&self) -> Address;

    fn start(&mut self) -> BoxFuture<'_, Result<(), NodeError>>;

    /// Stop serving and release the address. A no-op on a node that is not running.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), NodeError>>;
}

/// Builds the node a coordinator starts on connect.
pub type NodeFactory =
    Arc<dyn Fn(Arc<dyn Network>, NodeOptions) -> Box<dyn StorageNode> + Send + Sync>;

/// The factory that builds a real [`Node`].
pub fn default_node_factory() -> NodeFactory {
    Arc::new(
        |network: Arc<dyn Network>, options: NodeOptions| -> Box<dyn StorageNode> {
            Box::new(Node::new(network, options))
        },
    )
}

struct RunningNode {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<std::io::Result<()>>,
    // Dropping the claim frees the logical address for the next bind.
    _registration: Option<Box<dyn Registration>>,
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// A storage node hosting a fixed set of partitions. Dropping a running node aborts its server
/// and releases its address.
pub struct Node {
    network: Arc<dyn Network>,
    options: NodeOptions,
    running: Option<RunningNode>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("network", &self.network.name())
            .field("options", &self.options)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

impl Node {
    pub fn new(network: Arc<dyn Network>, options: NodeOptions) -> Self {
        Self {
            network,
            options,
            running: None,
        }
    }

    pub fn address(&self) -> Address {
        self.options.address()
    }

    pub fn partitions(&self) -> &[PartitionId] {
        &self.options.partitions
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// The socket the server actually listens on, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub async fn start(&mut self) -> Result<(), NodeError> {
        let address = self.address();
        if self.running.is_some() {
            return Err(NodeError::AlreadyStarted { address });
        }
        if self.options.partitions.is_empty() {
            return Err(NodeError::NoPartitions { address });
        }

        let listener = self
            .network
            .bind(&address)
            .await
            .map_err(NodeError::Bind)?;
        let local_addr = listener.local_addr().map_err(|source| NodeError::Io {
            address: address.clone(),
            source,
        })?;
        let (listener, registration) = listener.into_parts();

        let state = NodeState::new(address.clone(), self.options.partitions.iter().copied());
        let router = build_router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(
            %address,
            %local_addr,
            network = self.network.name(),
            partitions = ?self.options.partitions,
            "storage node started"
        );
        self.running = Some(RunningNode {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            join,
            _registration: registration,
        });
        Ok(())
    }

    /// Stop serving and release the address. Stopping a node that is not running is a no-op.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        let address = self.address();
        if let Some(tx) = running.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let result = match tokio::time::timeout(STOP_GRACE, &mut running.join).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(source))) => Err(NodeError::Serve {
                address: address.clone(),
                source,
            }),
            Ok(Err(source)) => Err(NodeError::Join {
                address: address.clone(),
                source,
            }),
            Err(_) => {
                warn!(
                    %address,
                    grace_secs = STOP_GRACE.as_secs(),
                    "storage node did not drain in time, aborting"
                );
                Ok(())
            }
        };
        drop(running);
        info!(%address, "storage node stopped");
        result
    }
}

impl StorageNode for Node {
    fn address(&self) -> Address {
        Node::address(self)
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), NodeError>> {
        Node::start(self).boxed()
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), NodeError>> {
        Node::stop(self).boxed()
    }
}
