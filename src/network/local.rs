use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
};

use futures_util::{FutureExt as _, future::BoxFuture};
use tokio::net::TcpListener;
use tracing::debug;

use super::{Address, Listener, Network, NetworkError, Registration};

type Registry = Arc<Mutex<HashMap<Address, SocketAddr>>>;

/// In-process network: logical addresses live in a shared registry and are backed by ephemeral
/// loopback sockets, so `store1.ns1:8080` needs neither DNS nor a free port 8080.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    registry: Registry,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, address: &Address) -> bool {
        lock(&self.registry).contains_key(address)
    }
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<Address, SocketAddr>> {
    // The map is never left half-updated, so a poisoned guard is still consistent.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct LocalRegistration {
    registry: Registry,
    address: Address,
}

impl Registration for LocalRegistration {}

impl Drop for LocalRegistration {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.address);
        debug!(address = %self.address, "local address released");
    }
}

impl Network for LocalNetwork {
    fn name(&self) -> &'static str {
        "local"
    }

    fn bind<'a>(&'a self, address: &'a Address) -> BoxFuture<'a, Result<Listener, NetworkError>> {
        async move {
            if self.is_bound(address) {
                return Err(NetworkError::AddressInUse {
                    address: address.clone(),
                });
            }

            let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                .await
                .map_err(|source| NetworkError::Io {
                    address: address.clone(),
                    source,
                })?;
            let local_addr = listener.local_addr().map_err(|source| NetworkError::Io {
                address: address.clone(),
                source,
            })?;

            // Re-check under the lock: another bind may have won while we were awaiting.
            {
                let mut registry = lock(&self.registry);
                if registry.contains_key(address) {
                    return Err(NetworkError::AddressInUse {
                        address: address.clone(),
                    });
                }
                registry.insert(address.clone(), local_addr);
            }
            debug!(address = %address, %local_addr, "local address bound");

            let registration = LocalRegistration {
                registry: self.registry.clone(),
                address: address.clone(),
            };
            Ok(Listener::new(listener, Some(Box::new(registration))))
        }
        .boxed()
    }

    fn resolve<'a>(
        &'a self,
        address: &'a Address,
    ) -> BoxFuture<'a, Result<SocketAddr, NetworkError>> {
        let resolved = lock(&self.registry).get(address).copied();
        async move {
            resolved.ok_or_else(|| NetworkError::Unreachable {
                address: address.clone(),
            })
        }
        .boxed()
    }
}
