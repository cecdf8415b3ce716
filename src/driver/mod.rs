//! Plugin entry point: the driver and the connection coordinator it hands out.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{
    network::{LocalNetwork, Network},
    primitive::PrimitiveSpec,
    protocol::ProtocolError,
    proxy::{
        CounterMapServer, CounterServer, IndexedMapServer, LeaderElectionServer, LockServer,
        MapServer, MultiMapServer, SetServer, ValueServer,
    },
    version,
};

pub mod conn;

pub use conn::{ConnError, ConnOptions, DEFAULT_PORT, PodMemoryConn};

pub const DRIVER_NAME: &str = "PodMemory";

/// Identity of the deployment a connection serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnSpec {
    pub namespace: String,
    pub name: String,
}

impl ConnSpec {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Host the embedded node listens on: `{name}.{namespace}`.
    pub fn host(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }
}

/// Connection contract a host runtime drives. Proxy factories return trait objects so callers
/// never depend on the concrete proxy types.
pub trait Conn: Send + Sync {
    fn connect<'a>(&'a self, spec: &'a ConnSpec) -> BoxFuture<'a, Result<(), ConnError>>;

    fn close(&self) -> BoxFuture<'_, Result<(), ConnError>>;

    fn new_counter(&self, spec: &PrimitiveSpec) -> Result<Box<dyn CounterServer>, ProtocolError>;

    fn new_counter_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn CounterMapServer>, ProtocolError>;

    fn new_leader_election(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn LeaderElectionServer>, ProtocolError>;

    fn new_indexed_map(
        &self,
        spec: &PrimitiveSpec,
    ) -> Result<Box<dyn IndexedMapServer>, ProtocolError>;

    fn new_lock(&self, spec: &PrimitiveSpec) -> Result<Box<dyn LockServer>, ProtocolError>;

    fn new_map(&self, spec: &PrimitiveSpec) -> Result<Box<dyn MapServer>, ProtocolError>;

    fn new_multi_map(&self, spec: &PrimitiveSpec)
    -> Result<Box<dyn MultiMapServer>, ProtocolError>;

    fn new_set(&self, spec: &PrimitiveSpec) -> Result<Box<dyn SetServer>, ProtocolError>;

    fn new_value(&self, spec: &PrimitiveSpec) -> Result<Box<dyn ValueServer>, ProtocolError>;
}

#[derive(Clone)]
pub struct Driver {
    network: Arc<dyn Network>,
    options: ConnOptions,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("network", &self.network.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Driver {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self {
            network,
            options: ConnOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    pub fn version(&self) -> &'static str {
        version::VERSION
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// A fresh, unconnected coordinator over this driver's network.
    pub fn new_conn(&self) -> PodMemoryConn {
        PodMemoryConn::with_options(self.network.clone(), self.options.clone())
    }

    pub async fn connect(&self, spec: &ConnSpec) -> Result<PodMemoryConn, ConnError> {
        let conn = self.new_conn();
        conn.connect(spec).await?;
        Ok(conn)
    }
}

/// The plugin entry point: a driver over an in-process network.
pub fn plugin() -> Driver {
    Driver::new(Arc::new(LocalNetwork::new()))
}
