use std::{fmt, sync::Arc};

use futures_util::{FutureExt as _, future::BoxFuture};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Conn, ConnSpec};
use crate::{
    network::{Address, Network},
    node::{NodeError, NodeFactory, NodeOptions, StorageNode, default_node_factory},
    primitive::PrimitiveSpec,
    protocol::{
        DEFAULT_PARTITION_ID, PartitionId, ProtocolClient, ProtocolConfig, ProtocolError,
        ProtocolOptions,
    },
    proxy::{
        self, CounterMapServer, CounterServer, IndexedMapServer, LeaderElectionServer,
        LockServer, MapServer, MultiMapServer, SetServer, ValueServer,
    },
};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnOptions {
    pub port: u16,
    pub partition_id: PartitionId,
    pub protocol: ProtocolOptions,
}

impl Default for ConnOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            partition_id: DEFAULT_PARTITION_ID,
            protocol: ProtocolOptions::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConnError {
    /// The embedded node could not start; nothing was left running.
    Startup(NodeError),
    /// The protocol client could not connect; the node was stopped again.
    Connect(ProtocolError),
    /// The protocol client could not connect, and stopping the node afterwards failed too.
    Rollback {
        connect: ProtocolError,
        node: NodeError,
    },
    /// One or both shutdown steps failed. State is cleared regardless.
    Shutdown {
        client: Option<ProtocolError>,
        node: Option<NodeError>,
    },
}

impl fmt::Display for ConnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup(e) => write!(f, "start storage node: {e}"),
            Self::Connect(e) => write!(f, "connect protocol client: {e}"),
            Self::Rollback { connect, node } => write!(
                f,
                "connect protocol client: {connect} (stopping storage node also failed: {node})"
            ),
            Self::Shutdown { client, node } => {
                write!(f, "close connection:")?;
                if let Some(e) = client {
                    write!(f, " client: {e};")?;
                }
                if let Some(e) = node {
                    write!(f, " node: {e};")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Startup(e) => Some(e),
            Self::Connect(e) | Self::Rollback { connect: e, .. } => Some(e),
            Self::Shutdown { client: Some(e), .. } => Some(e),
            Self::Shutdown {
                client: None,
                node: Some(e),
            } => Some(e),
            Self::Shutdown { .. } => None,
        }
    }
}

/// Coordinator owning one embedded storage node and the protocol client that leads its single
/// partition. Connect and close are serialised by one lock; proxy creation only reads the client.
pub struct PodMemoryConn {
    network: Arc<dyn Network>,
    options: ConnOptions,
    protocol: ProtocolClient,
    node_factory: NodeFactory,
    node: Mutex<Option<Box<dyn StorageNode>>>,
}

impl fmt::Debug for PodMemoryConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PodMemoryConn")
            .field("network", &self.network.name())
            .field("options", &self.options)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl PodMemoryConn {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self::with_options(network, ConnOptions::default())
    }

    pub fn with_options(network: Arc<dyn Network>, options: ConnOptions) -> Self {
        let protocol = ProtocolClient::new(network.clone(), options.protocol.clone());
        Self {
            network,
            options,
            protocol,
            node_factory: default_node_factory(),
            node: Mutex::new(None),
        }
    }

    /// Replace how the embedded node is built on connect.
    pub fn with_node_factory(mut self, factory: NodeFactory) -> Self {
        self.node_factory = factory;
        self
    }

    pub fn options(&self) -> &ConnOptions {
        &self.options
    }

    pub fn protocol(&self) -> &ProtocolClient {
        &self.protocol
    }

    pub async fn is_connected(&self) -> bool {
        self.node.lock().await.is_some()
    }

    /// Logical address of the embedded node, while connected.
    pub async fn node_address(&self) -> Option<Address> {
        self.node.lock().await.as_ref().map(|node| node.address())
    }

    /// Start the node for `spec` and connect the client to it. A no-op when already connected,
    /// whatever `spec` is.
    pub async fn connect(&self, spec: &ConnSpec) -> Result<(), ConnError> {
        let mut slot = self.node.lock().await;
        if slot.is_some() {
            debug!(namespace = %spec.namespace, name = %spec.name, "already connected");
            return Ok(());
        }

        let options = NodeOptions::new(spec.host(), self.options.port)
            .with_partitions([self.options.partition_id]);
        let address = options.address();
        let mut node = (self.node_factory)(self.network.clone(), options);
        node.start().await.map_err(ConnError::Startup)?;

        let config = ProtocolConfig::single_partition(self.options.partition_id, &address);
        if let Err(connect) = self.protocol.connect(config).await {
            return Err(match node.stop().await {
                Ok(()) => ConnError::Connect(connect),
                Err(node) => ConnError::Rollback { connect, node },
            });
        }

        info!(
            %address,
            partition_id = self.options.partition_id,
            "pod memory connected"
        );
        *slot = Some(node);
        Ok(())
    }

    /// Close the client, then stop the node. Both steps always run; a no-op when disconnected.
    pub async fn close(&self) -> Result<(), ConnError> {
        let mut slot = self.node.lock().await;
        let Some(mut node) = slot.take() else {
            return Ok(());
        };
        let client = self.protocol.close().await.err();
        let stopped = node.stop().await.err();
        info!(address = %node.address(), "pod memory closed");

        match (client, stopped) {
            (None, None) => Ok(()),
            (client, node) => Err(ConnError::Shutdown { client, node }),
        }
    }

    pub fn new_counter(&self, spec: &PrimitiveSpec) -> Result<proxy::CounterProxy, ProtocolError> {
        proxy::new_counter_proxy(&self.protocol, spec)
    }

    pub fn new_counter_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<proxy::CounterMapProxy, ProtocolError> {
        proxy::new_counter_map_proxy(&self.protocol, spec)
    }

    pub fn new_leader_election(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<proxy::LeaderElectionProxy, ProtocolError> {
        proxy::new_leader_election_proxy(&self.protocol, spec)
    }

    pub fn new_indexed_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<proxy::IndexedMapProxy, ProtocolError> {
        proxy::new_indexed_map_proxy(&self.protocol, spec)
    }

    pub fn new_lock(&self, spec: &PrimitiveSpec) -> Result<proxy::LockProxy, ProtocolError> {
        proxy::new_lock_proxy(&self.protocol, spec)
    }

    pub fn new_map(&self, spec: &PrimitiveSpec) -> Result<proxy::MapProxy, ProtocolError> {
        proxy::new_map_proxy(&self.protocol, spec)
    }

    pub fn new_multi_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<proxy::MultiMapProxy, ProtocolError> {
        proxy::new_multi_map_proxy(&self.protocol, spec)
    }

    pub fn new_set(&self, spec: &PrimitiveSpec) -> Result<proxy::SetProxy, ProtocolError> {
        proxy::new_set_proxy(&self.protocol, spec)
    }

    pub fn new_value(&self, spec: &PrimitiveSpec) -> Result<proxy::ValueProxy, ProtocolError> {
        proxy::new_value_proxy(&self.protocol, spec)
    }
}

impl Conn for PodMemoryConn {
    fn connect<'a>(&'a self, spec: &'a ConnSpec) -> BoxFuture<'a, Result<(), ConnError>> {
        PodMemoryConn::connect(self, spec).boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ConnError>> {
        PodMemoryConn::close(self).boxed()
    }

    fn new_counter(&self, spec: &PrimitiveSpec) -> Result<Box<dyn CounterServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_counter(self, spec)?))
    }

    fn new_counter_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn CounterMapServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_counter_map(self, spec)?))
    }

    fn new_leader_election(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn LeaderElectionServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_leader_election(self, spec)?))
    }

    fn new_indexed_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn IndexedMapServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_indexed_map(self, spec)?))
    }

    fn new_lock(&self, spec: &PrimitiveSpec) -> Result<Box<dyn LockServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_lock(self, spec)?))
    }

    fn new_map(&self, spec: &PrimitiveSpec) -> Result<Box<dyn MapServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_map(self, spec)?))
    }

    fn new_multi_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn MultiMapServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_multi_map(self, spec)?))
    }

    fn new_set(&self, spec: &PrimitiveSpec) -> Result<Box<dyn SetServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_set(self, spec)?))
    }

    fn new_value(&self, spec: &PrimitiveSpec) -> Result<Box<dyn ValueServer>, ProtocolError> {
        Ok(Box::new(PodMemoryConn::new_value(self, spec)?))
    }
}
