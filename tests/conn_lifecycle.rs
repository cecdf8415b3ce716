use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use futures_util::{FutureExt as _, future::BoxFuture, future::join_all};
use pretty_assertions::assert_eq;

use pod_memory::{
    Conn, ConnError, ConnOptions, ConnSpec, PodMemoryConn,
    network::{Address, Listener, LocalNetwork, Network, NetworkError},
    node::{Node, NodeError, NodeFactory, NodeOptions, StorageNode},
    primitive::{PrimitiveKind, PrimitiveSpec},
    protocol::{Connection, PartitionConfig, ProtocolError},
    proxy::{CounterServer as _, PrimitiveProxy},
};

/// Local network that counts binds and can be told to refuse resolves.
struct CountingNetwork {
    inner: LocalNetwork,
    binds: AtomicUsize,
    refuse_resolve: AtomicBool,
}

impl CountingNetwork {
    fn new(refuse_resolve: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalNetwork::new(),
            binds: AtomicUsize::new(0),
            refuse_resolve: AtomicBool::new(refuse_resolve),
        })
    }

    fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    fn allow_resolve(&self) {
        self.refuse_resolve.store(false, Ordering::SeqCst);
    }
}

impl Network for CountingNetwork {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn bind<'a>(&'a self, address: &'a Address) -> BoxFuture<'a, Result<Listener, NetworkError>> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        self.inner.bind(address)
    }

    fn resolve<'a>(
        &'a self,
        address: &'a Address,
    ) -> BoxFuture<'a, Result<SocketAddr, NetworkError>> {
        if self.refuse_resolve.load(Ordering::SeqCst) {
            return async move {
                Err(NetworkError::Unreachable {
                    address: address.clone(),
                })
            }
            .boxed();
        }
        self.inner.resolve(address)
    }
}

/// A real node whose stop releases everything and then reports a failure anyway.
struct StopFailsNode {
    inner: Node,
    stops: Arc<AtomicUsize>,
}

impl StorageNode for StopFailsNode {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), NodeError>> {
        self.inner.start().boxed()
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), NodeError>> {
        async move {
            self.inner.stop().await?;
            self.stops.fetch_add(1, Ordering::SeqCst);
            Err(NodeError::Io {
                address: self.inner.address(),
                source: io::Error::other("disk detached"),
            })
        }
        .boxed()
    }
}

fn stop_fails_factory(stops: Arc<AtomicUsize>) -> NodeFactory {
    Arc::new(
        move |network: Arc<dyn Network>, options: NodeOptions| -> Box<dyn StorageNode> {
            Box::new(StopFailsNode {
                inner: Node::new(network, options),
                stops: stops.clone(),
            })
        },
    )
}

fn spec() -> ConnSpec {
    ConnSpec::new("ns1", "store1")
}

fn leader() -> Address {
    Address::new("store1.ns1", 8080)
}

#[tokio::test]
async fn connect_twice_starts_node_once() {
    let network = CountingNetwork::new(false);
    let conn = PodMemoryConn::new(network.clone());

    conn.connect(&spec()).await.unwrap();
    conn.connect(&spec()).await.unwrap();

    assert_eq!(network.binds(), 1);
    assert!(conn.is_connected().await);
    assert_eq!(conn.node_address().await, Some(leader()));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn single_partition_led_by_own_node() {
    let conn = PodMemoryConn::new(Arc::new(LocalNetwork::new()));
    conn.connect(&spec()).await.unwrap();

    let config = conn.protocol().config().unwrap();
    assert_eq!(
        config.partitions,
        vec![PartitionConfig {
            partition_id: 1,
            leader: "store1.ns1:8080".to_string(),
        }]
    );
    conn.close().await.unwrap();
}

#[tokio::test]
async fn close_before_connect_is_noop() {
    let conn = PodMemoryConn::new(Arc::new(LocalNetwork::new()));
    conn.close().await.unwrap();
    assert!(!conn.is_connected().await);
}

#[tokio::test]
async fn close_then_reconnect_gets_fresh_node() {
    let network = CountingNetwork::new(false);
    let conn = PodMemoryConn::new(network.clone());
    let counter_spec = PrimitiveSpec::new("hits");

    conn.connect(&spec()).await.unwrap();
    let counter = conn.new_counter(&counter_spec).unwrap();
    assert_eq!(counter.increment(5).await.unwrap(), 5);

    conn.close().await.unwrap();
    assert!(!conn.is_connected().await);
    assert!(!network.inner.is_bound(&leader()));
    assert!(!conn.protocol().is_connected());

    conn.connect(&spec()).await.unwrap();
    assert_eq!(network.binds(), 2);

    // The proxy from before the close stays dead; a new one sees an empty node.
    assert!(matches!(counter.get().await, Err(ProtocolError::Closed)));
    let counter = conn.new_counter(&counter_spec).unwrap();
    assert_eq!(counter.get().await.unwrap(), 0);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn startup_failure_leaves_conn_disconnected() {
    let network = Arc::new(LocalNetwork::new());
    let squatter = network.bind(&leader()).await.unwrap();
    let conn = PodMemoryConn::new(network.clone());

    let err = conn.connect(&spec()).await.unwrap_err();
    assert!(matches!(
        err,
        ConnError::Startup(NodeError::Bind(NetworkError::AddressInUse { .. }))
    ));
    assert!(!conn.is_connected().await);
    assert!(!conn.protocol().is_connected());

    drop(squatter);
    conn.connect(&spec()).await.unwrap();
    assert!(conn.is_connected().await);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn client_failure_stops_the_started_node() {
    let network = CountingNetwork::new(true);
    let conn = PodMemoryConn::new(network.clone());

    let err = conn.connect(&spec()).await.unwrap_err();
    assert!(matches!(
        err,
        ConnError::Connect(ProtocolError::Network(NetworkError::Unreachable { .. }))
    ));
    assert_eq!(network.binds(), 1);
    assert!(!network.inner.is_bound(&leader()));
    assert!(!conn.is_connected().await);
}

#[tokio::test]
async fn failed_node_stop_still_clears_state_on_close() {
    let network = CountingNetwork::new(false);
    let stops = Arc::new(AtomicUsize::new(0));
    let conn =
        PodMemoryConn::new(network.clone()).with_node_factory(stop_fails_factory(stops.clone()));
    conn.connect(&spec()).await.unwrap();
    let counter = conn.new_counter(&PrimitiveSpec::new("hits")).unwrap();

    let err = conn.close().await.unwrap_err();
    assert!(matches!(
        err,
        ConnError::Shutdown {
            client: None,
            node: Some(NodeError::Io { .. }),
        }
    ));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(!conn.is_connected().await);
    assert!(!conn.protocol().is_connected());
    assert!(!network.inner.is_bound(&leader()));
    assert!(matches!(counter.get().await, Err(ProtocolError::Closed)));

    // Nothing is left to stop, and a new connect starts clean.
    conn.close().await.unwrap();
    conn.connect(&spec()).await.unwrap();
    assert_eq!(network.binds(), 2);
    assert!(conn.close().await.is_err());
    assert!(!conn.is_connected().await);
}

#[tokio::test]
async fn failed_rollback_reports_both_errors_and_allows_retry() {
    let network = CountingNetwork::new(true);
    let stops = Arc::new(AtomicUsize::new(0));
    let conn =
        PodMemoryConn::new(network.clone()).with_node_factory(stop_fails_factory(stops.clone()));

    let err = conn.connect(&spec()).await.unwrap_err();
    assert!(matches!(
        err,
        ConnError::Rollback {
            connect: ProtocolError::Network(NetworkError::Unreachable { .. }),
            node: NodeError::Io { .. },
        }
    ));
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(!conn.is_connected().await);
    assert!(!conn.protocol().is_connected());
    assert!(!network.inner.is_bound(&leader()));

    network.allow_resolve();
    conn.connect(&spec()).await.unwrap();
    assert!(conn.is_connected().await);
    assert_eq!(network.binds(), 2);
    assert!(conn.close().await.is_err());
}

#[tokio::test]
async fn concurrent_connects_start_node_once() {
    let network = CountingNetwork::new(false);
    let conn = PodMemoryConn::new(network.clone());

    let spec = spec();
    let attempts = (0..8).map(|_| conn.connect(&spec));
    for result in join_all(attempts).await {
        result.unwrap();
    }

    assert_eq!(network.binds(), 1);
    assert!(conn.is_connected().await);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn proxies_before_connect_are_not_connected() {
    let conn = PodMemoryConn::new(Arc::new(LocalNetwork::new()));
    let conn: &dyn Conn = &conn;
    let spec = PrimitiveSpec::new("p");

    assert!(matches!(
        conn.new_counter(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_counter_map(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_leader_election(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_indexed_map(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_lock(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_map(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_multi_map(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_set(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
    assert!(matches!(
        conn.new_value(&spec).err(),
        Some(ProtocolError::NotConnected)
    ));
}

#[tokio::test]
async fn every_proxy_shares_the_client_connection() {
    let owned = PodMemoryConn::new(Arc::new(LocalNetwork::new()));
    let conn: &dyn Conn = &owned;
    conn.connect(&spec()).await.unwrap();
    let spec = PrimitiveSpec::new("shared");
    let connection = owned.protocol().connection().unwrap();

    let mut kinds = vec![
        shares(&*conn.new_counter(&spec).unwrap(), &connection),
        shares(&*conn.new_counter_map(&spec).unwrap(), &connection),
        shares(&*conn.new_leader_election(&spec).unwrap(), &connection),
        shares(&*conn.new_indexed_map(&spec).unwrap(), &connection),
        shares(&*conn.new_lock(&spec).unwrap(), &connection),
        shares(&*conn.new_map(&spec).unwrap(), &connection),
        shares(&*conn.new_multi_map(&spec).unwrap(), &connection),
        shares(&*conn.new_set(&spec).unwrap(), &connection),
        shares(&*conn.new_value(&spec).unwrap(), &connection),
    ];
    kinds.sort();
    kinds.dedup();
    assert_eq!(kinds.len(), 9);

    conn.close().await.unwrap();
    assert!(connection.is_closed());
}

fn shares<P: PrimitiveProxy + ?Sized>(proxy: &P, connection: &Arc<Connection>) -> PrimitiveKind {
    assert_eq!(proxy.name(), "shared");
    assert!(Arc::ptr_eq(proxy.connection(), connection));
    proxy.kind()
}

#[tokio::test]
async fn coordinators_coexist_on_one_network() {
    let network: Arc<dyn Network> = Arc::new(LocalNetwork::new());
    let a = PodMemoryConn::new(network.clone());
    let b = PodMemoryConn::new(network.clone());
    let c = PodMemoryConn::new(network);

    a.connect(&spec()).await.unwrap();
    b.connect(&ConnSpec::new("ns2", "store1")).await.unwrap();
    assert!(matches!(
        c.connect(&spec()).await,
        Err(ConnError::Startup(_))
    ));

    // Each coordinator talks to its own node, so equal names stay apart.
    counter_roundtrip(&a, "x", 3).await;
    counter_roundtrip(&b, "x", 4).await;

    a.close().await.unwrap();
    c.connect(&spec()).await.unwrap();
    b.close().await.unwrap();
    c.close().await.unwrap();
}

#[tokio::test]
async fn port_override_changes_leader_address() {
    let conn = PodMemoryConn::with_options(
        Arc::new(LocalNetwork::new()),
        ConnOptions {
            port: 18080,
            ..ConnOptions::default()
        },
    );
    conn.connect(&spec()).await.unwrap();
    assert_eq!(
        conn.node_address().await,
        Some(Address::new("store1.ns1", 18080))
    );
    conn.close().await.unwrap();
}

async fn counter_roundtrip(conn: &PodMemoryConn, name: &str, delta: i64) {
    let counter = conn.new_counter(&PrimitiveSpec::new(name)).unwrap();
    assert_eq!(counter.increment(delta).await.unwrap(), delta);
    assert_eq!(counter.get().await.unwrap(), delta);
}
