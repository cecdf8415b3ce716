//! Client-side proxies: one object-safe server trait per primitive kind, each implemented by a
//! proxy that forwards calls over the protocol client's connection.

use std::sync::Arc;

use crate::{
    primitive::{Primitive, PrimitiveError, PrimitiveKind, PrimitiveSpec},
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub mod counter;
pub mod counter_map;
pub mod election;
pub mod indexed_map;
pub mod lock;
pub mod map;
pub mod multi_map;
pub mod set;
pub mod value;

pub use counter::{CounterProxy, CounterServer, new_counter_proxy};
pub use counter_map::{CounterMapProxy, CounterMapServer, new_counter_map_proxy};
pub use election::{LeaderElectionProxy, LeaderElectionServer, new_leader_election_proxy};
pub use indexed_map::{IndexedMapProxy, IndexedMapServer, new_indexed_map_proxy};
pub use lock::{LockProxy, LockServer, new_lock_proxy};
pub use map::{MapProxy, MapServer, new_map_proxy};
pub use multi_map::{MultiMapProxy, MultiMapServer, new_multi_map_proxy};
pub use set::{SetProxy, SetServer, new_set_proxy};
pub use value::{ValueProxy, ValueServer, new_value_proxy};

/// What every proxy exposes regardless of kind.
pub trait PrimitiveProxy: Send + Sync {
    fn kind(&self) -> PrimitiveKind;

    fn name(&self) -> &str;

    /// The connection this proxy was created against.
    fn connection(&self) -> &Arc<Connection>;
}

/// A named primitive bound to one connection.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    connection: Arc<Connection>,
    name: String,
}

impl Session {
    pub(crate) fn open(
        protocol: &ProtocolClient,
        spec: &PrimitiveSpec,
    ) -> Result<Self, ProtocolError> {
        if spec.name.is_empty() {
            return Err(PrimitiveError::invalid_argument("primitive name is empty").into());
        }
        Ok(Self {
            connection: protocol.connection()?,
            name: spec.name.clone(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub(crate) async fn execute<P: Primitive>(
        &self,
        request: P::Request,
    ) -> Result<P::Response, ProtocolError> {
        self.connection.execute::<P>(&self.name, request).await
    }
}

/// The node answered with a response variant the operation never produces.
pub(crate) fn unexpected<P: Primitive>(response: P::Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        kind: P::KIND,
        response: format!("{response:?}"),
    }
}
