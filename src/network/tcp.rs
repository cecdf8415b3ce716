use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use futures_util::{FutureExt as _, future::BoxFuture};
use tokio::net::TcpListener;

use super::{Address, Listener, Network, NetworkError};

/// Host network: listeners bind `bind_ip:port` and addresses resolve through DNS.
#[derive(Debug, Clone, Copy)]
pub struct TcpNetwork {
    bind_ip: IpAddr,
}

impl TcpNetwork {
    pub fn new(bind_ip: IpAddr) -> Self {
        Self { bind_ip }
    }
}

impl Default for TcpNetwork {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl Network for TcpNetwork {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn bind<'a>(&'a self, address: &'a Address) -> BoxFuture<'a, Result<Listener, NetworkError>> {
        async move {
            let listener = TcpListener::bind(SocketAddr::new(self.bind_ip, address.port))
                .await
                .map_err(|source| match source.kind() {
                    std::io::ErrorKind::AddrInUse => NetworkError::AddressInUse {
                        address: address.clone(),
                    },
                    _ => NetworkError::Io {
                        address: address.clone(),
                        source,
                    },
                })?;
            Ok(Listener::new(listener, None))
        }
        .boxed()
    }

    fn resolve<'a>(
        &'a self,
        address: &'a Address,
    ) -> BoxFuture<'a, Result<SocketAddr, NetworkError>> {
        async move {
            let mut addrs = tokio::net::lookup_host((address.host.as_str(), address.port))
                .await
                .map_err(|source| NetworkError::Io {
                    address: address.clone(),
                    source,
                })?;
            addrs.next().ok_or_else(|| NetworkError::Unreachable {
                address: address.clone(),
            })
        }
        .boxed()
    }
}
