use std::{
    fmt,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{ErrorResponse, HealthResponse, PartitionId, ProtocolConfig, ProtocolError};
use crate::{
    network::{Address, Network},
    primitive::{Primitive, PrimitiveError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOptions {
    /// Bounds TCP connect and the health handshake.
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

struct PartitionRoute {
    partition_id: PartitionId,
    leader: Address,
    base: reqwest::Url,
}

impl PartitionRoute {
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, ProtocolError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ProtocolError::invalid_config(format!("{} has no path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn handshake(
        &self,
        http: &reqwest::Client,
        timeout: Duration,
    ) -> Result<(), ProtocolError> {
        let res = http
            .get(self.url(&["v1", "health"])?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport("handshake", e))?;
        let health: HealthResponse = decode(res, "handshake").await?;
        if !health.partitions.contains(&self.partition_id) {
            return Err(ProtocolError::Handshake {
                partition_id: self.partition_id,
                reason: format!(
                    "{} hosts partitions {:?}",
                    self.leader, health.partitions
                ),
            });
        }
        debug!(
            partition_id = self.partition_id,
            leader = %self.leader,
            node = %health.address,
            "partition handshake ok"
        );
        Ok(())
    }
}

/// An established session against the partition leader. Proxies hold it directly, so closing
/// the client invalidates every proxy created before the close.
pub struct Connection {
    config: ProtocolConfig,
    route: PartitionRoute,
    http: reqwest::Client,
    closed: AtomicBool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The single partition every primitive lives on.
    pub fn partition_id(&self) -> PartitionId {
        self.route.partition_id
    }

    pub async fn execute<P: Primitive>(
        &self,
        name: &str,
        request: P::Request,
    ) -> Result<P::Response, ProtocolError> {
        if self.is_closed() {
            return Err(ProtocolError::Closed);
        }
        let route = &self.route;
        let partition = route.partition_id.to_string();
        let url = route.url(&["v1", "partitions", partition.as_str(), P::KIND.as_str(), name])?;

        let res = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport("execute", e))?;
        let result: Result<P::Response, PrimitiveError> = decode(res, "execute").await?;
        result.map_err(ProtocolError::Primitive)
    }
}

fn transport(operation: &'static str, err: reqwest::Error) -> ProtocolError {
    if err.is_timeout() {
        ProtocolError::Timeout { operation }
    } else {
        ProtocolError::Transport(err)
    }
}

async fn decode<T: DeserializeOwned>(
    res: reqwest::Response,
    operation: &'static str,
) -> Result<T, ProtocolError> {
    let status = res.status();
    if status.is_success() {
        return res.json::<T>().await.map_err(|e| transport(operation, e));
    }
    let (code, message) = match res.json::<ErrorResponse>().await {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("unknown").to_string(),
            String::new(),
        ),
    };
    Err(ProtocolError::Status {
        status: status.as_u16(),
        code,
        message,
    })
}

struct ClientInner {
    network: Arc<dyn Network>,
    options: ProtocolOptions,
    connection: RwLock<Option<Arc<Connection>>>,
}

/// Client side of the protocol. Cheap to clone; clones share one connection slot.
#[derive(Clone)]
pub struct ProtocolClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("network", &self.inner.network.name())
            .field("options", &self.inner.options)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ProtocolClient {
    pub fn new(network: Arc<dyn Network>, options: ProtocolOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                network,
                options,
                connection: RwLock::new(None),
            }),
        }
    }

    pub fn options(&self) -> &ProtocolOptions {
        &self.inner.options
    }

    fn slot(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<Connection>>> {
        // Only whole `Option`s are ever stored, so a poisoned slot is still consistent.
        self.inner
            .connection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<Connection>>> {
        self.inner
            .connection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }

    /// Topology of the current connection, if any.
    pub fn config(&self) -> Option<ProtocolConfig> {
        self.slot().as_ref().map(|c| c.config.clone())
    }

    pub fn connection(&self) -> Result<Arc<Connection>, ProtocolError> {
        self.slot().as_ref().cloned().ok_or(ProtocolError::NotConnected)
    }

    /// Resolve the partition leader and check it actually hosts the partition.
    pub async fn connect(&self, config: ProtocolConfig) -> Result<(), ProtocolError> {
        if self.is_connected() {
            return Err(ProtocolError::AlreadyConnected);
        }
        let (partition_id, leader) = config.validate()?;
        let options = &self.inner.options;
        let http = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()?;

        let socket = self.inner.network.resolve(&leader).await?;
        let base = reqwest::Url::parse(&format!("http://{socket}/"))
            .map_err(|e| ProtocolError::invalid_config(e.to_string()))?;
        let route = PartitionRoute {
            partition_id,
            leader,
            base,
        };
        route.handshake(&http, options.connect_timeout).await?;

        let connection = Arc::new(Connection {
            config,
            route,
            http,
            closed: AtomicBool::new(false),
        });
        {
            let mut slot = self.slot_mut();
            if slot.is_some() {
                return Err(ProtocolError::AlreadyConnected);
            }
            *slot = Some(connection.clone());
        }
        info!(
            partition_id = connection.route.partition_id,
            leader = %connection.route.leader,
            network = self.inner.network.name(),
            "protocol client connected"
        );
        Ok(())
    }

    /// Drop the current connection. Closing a client that is not connected is a no-op.
    pub async fn close(&self) -> Result<(), ProtocolError> {
        let connection = self.slot_mut().take();
        if let Some(connection) = connection {
            connection.closed.store(true, Ordering::Release);
            info!("protocol client closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        network::LocalNetwork,
        node::{Node, NodeOptions},
        primitive::{Counter, counter::CounterRequest},
        protocol::{DEFAULT_PARTITION_ID, PartitionConfig},
    };

    async fn started_node(network: &Arc<dyn Network>, partitions: Vec<PartitionId>) -> Node {
        let mut node = Node::new(
            network.clone(),
            NodeOptions::new("store1.ns1", 8080).with_partitions(partitions),
        );
        node.start().await.unwrap();
        node
    }

    fn leader_config(partition_id: PartitionId) -> ProtocolConfig {
        ProtocolConfig {
            partitions: vec![PartitionConfig {
                partition_id,
                leader: "store1.ns1:8080".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn connect_execute_close() {
        let network: Arc<dyn Network> = Arc::new(LocalNetwork::new());
        let mut node = started_node(&network, vec![DEFAULT_PARTITION_ID]).await;
        let client = ProtocolClient::new(network, ProtocolOptions::default());

        assert!(matches!(
            client.connection(),
            Err(ProtocolError::NotConnected)
        ));
        client.connect(leader_config(1)).await.unwrap();
        assert_eq!(client.config(), Some(leader_config(1)));
        assert!(matches!(
            client.connect(leader_config(1)).await,
            Err(ProtocolError::AlreadyConnected)
        ));

        let connection = client.connection().unwrap();
        let res = connection
            .execute::<Counter>("hits", CounterRequest::Increment { delta: 2 })
            .await
            .unwrap();
        assert_eq!(res.value, 2);
        assert_eq!(connection.partition_id(), 1);

        client.close().await.unwrap();
        assert!(!client.is_connected());
        assert!(connection.is_closed());
        assert!(matches!(
            connection
                .execute::<Counter>("hits", CounterRequest::Get)
                .await,
            Err(ProtocolError::Closed)
        ));
        client.close().await.unwrap();
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn primitive_errors_surface_as_primitive() {
        let network: Arc<dyn Network> = Arc::new(LocalNetwork::new());
        let mut node = started_node(&network, vec![1]).await;
        let client = ProtocolClient::new(network, ProtocolOptions::default());
        client.connect(leader_config(1)).await.unwrap();

        let err = client
            .connection()
            .unwrap()
            .execute::<Counter>("c", CounterRequest::Update { check: 5, update: 6 })
            .await
            .unwrap_err();
        assert_eq!(err.primitive().map(|e| e.code()), Some("conflict"));

        client.close().await.unwrap();
        node.stop().await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_missing_leader_is_unreachable() {
        let network: Arc<dyn Network> = Arc::new(LocalNetwork::new());
        let client = ProtocolClient::new(network, ProtocolOptions::default());
        let err = client.connect(leader_config(1)).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Network(_)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn handshake_rejects_unhosted_partition() {
        let network: Arc<dyn Network> = Arc::new(LocalNetwork::new());
        let mut node = started_node(&network, vec![1]).await;
        let client = ProtocolClient::new(network, ProtocolOptions::default());

        let err = client.connect(leader_config(7)).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Handshake {
                partition_id: 7,
                ..
            }
        ));
        assert!(!client.is_connected());
        node.stop().await.unwrap();
    }
}
