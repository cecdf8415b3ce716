//! Network providers.
//!
//! A provider hands out listening sockets for logical `host:port` addresses and maps the same
//! addresses back to something a client can dial. The storage node binds through it and the
//! protocol client resolves through it, so both sides agree on what an address means.

use std::{fmt, io, net::SocketAddr, str::FromStr};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub mod local;
pub mod tcp;

pub use local::LocalNetwork;
pub use tcp::TcpNetwork;

/// A logical network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError {
    input: String,
    reason: &'static str,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| AddressParseError {
            input: s.to_string(),
            reason,
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(|| err("missing port"))?;
        if host.is_empty() {
            return Err(err("empty host"));
        }
        let port = port.parse::<u16>().map_err(|_| err("invalid port"))?;
        Ok(Self::new(host, port))
    }
}

#[derive(Debug)]
pub enum NetworkError {
    AddressInUse { address: Address },
    Unreachable { address: Address },
    Io { address: Address, source: io::Error },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressInUse { address } => write!(f, "address already in use: {address}"),
            Self::Unreachable { address } => write!(f, "address unreachable: {address}"),
            Self::Io { address, source } => write!(f, "network io error on {address}: {source}"),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::AddressInUse { .. } | Self::Unreachable { .. } => None,
        }
    }
}

/// Keeps a logical address claimed for as long as it is alive.
pub trait Registration: Send + Sync + 'static {}

/// A bound listener together with the claim on its logical address.
pub struct Listener {
    listener: TcpListener,
    registration: Option<Box<dyn Registration>>,
}

impl Listener {
    pub fn new(listener: TcpListener, registration: Option<Box<dyn Registration>>) -> Self {
        Self {
            listener,
            registration,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Split into the raw socket and the address claim. Dropping the claim releases the address.
    pub fn into_parts(self) -> (TcpListener, Option<Box<dyn Registration>>) {
        (self.listener, self.registration)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("registered", &self.registration.is_some())
            .finish()
    }
}

pub trait Network: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Bind a listener that serves `address`.
    fn bind<'a>(&'a self, address: &'a Address) -> BoxFuture<'a, Result<Listener, NetworkError>>;

    /// Map `address` to a socket address a client can dial.
    fn resolve<'a>(&'a self, address: &'a Address)
    -> BoxFuture<'a, Result<SocketAddr, NetworkError>>;
}
