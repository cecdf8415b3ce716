//! Single-partition primitive storage embedded in the process that uses it.
//!
//! A [`driver::PodMemoryConn`] starts a storage [`node::Node`] on a logical address, connects a
//! [`protocol::ProtocolClient`] to it as the leader of its only partition, and hands out typed
//! proxies for counters, maps, sets, locks, elections and the other primitives.

pub mod config;
pub mod driver;
pub mod id;
pub mod network;
pub mod node;
pub mod primitive;
pub mod protocol;
pub mod proxy;
pub mod version;

pub use driver::{Conn, ConnError, ConnOptions, ConnSpec, Driver, PodMemoryConn, plugin};
