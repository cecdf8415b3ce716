use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        MultiMap, Primitive as _, PrimitiveKind, PrimitiveSpec,
        multi_map::{MultiMapEntry, MultiMapRequest, MultiMapResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait MultiMapServer: PrimitiveProxy {
    /// Returns `true` if the value was not already associated with `key`.
    fn put(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<bool, ProtocolError>>;

    fn put_all(
        &self,
        key: String,
        values: Vec<Vec<u8>>,
    ) -> BoxFuture<'_, Result<bool, ProtocolError>>;

    fn get(&self, key: String) -> BoxFuture<'_, Result<Vec<Vec<u8>>, ProtocolError>>;

    fn remove(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<bool, ProtocolError>>;

    /// Drops `key` and returns the values it held.
    fn remove_all(&self, key: String) -> BoxFuture<'_, Result<Vec<Vec<u8>>, ProtocolError>>;

    fn contains_entry(
        &self,
        key: String,
        value: Vec<u8>,
    ) -> BoxFuture<'_, Result<bool, ProtocolError>>;

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    fn entries(&self) -> BoxFuture<'_, Result<Vec<MultiMapEntry>, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct MultiMapProxy {
    session: Session,
}

pub fn new_multi_map_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<MultiMapProxy, ProtocolError> {
    Ok(MultiMapProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl MultiMapProxy {
    async fn call(&self, request: MultiMapRequest) -> Result<MultiMapResponse, ProtocolError> {
        self.session.execute::<MultiMap>(request).await
    }

    async fn updated(&self, request: MultiMapRequest) -> Result<bool, ProtocolError> {
        match self.call(request).await? {
            MultiMapResponse::Updated { updated } => Ok(updated),
            other => Err(unexpected::<MultiMap>(other)),
        }
    }

    async fn values(&self, request: MultiMapRequest) -> Result<Vec<Vec<u8>>, ProtocolError> {
        match self.call(request).await? {
            MultiMapResponse::Values { values } => Ok(values),
            other => Err(unexpected::<MultiMap>(other)),
        }
    }
}

impl PrimitiveProxy for MultiMapProxy {
    fn kind(&self) -> PrimitiveKind {
        MultiMap::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl MultiMapServer for MultiMapProxy {
    fn put(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<bool, ProtocolError>> {
        self.updated(MultiMapRequest::Put { key, value }).boxed()
    }

    fn put_all(
        &self,
        key: String,
        values: Vec<Vec<u8>>,
    ) -> BoxFuture<'_, Result<bool, ProtocolError>> {
        self.updated(MultiMapRequest::PutAll { key, values }).boxed()
    }

    fn get(&self, key: String) -> BoxFuture<'_, Result<Vec<Vec<u8>>, ProtocolError>> {
        self.values(MultiMapRequest::Get { key }).boxed()
    }

    fn remove(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<bool, ProtocolError>> {
        self.updated(MultiMapRequest::Remove { key, value }).boxed()
    }

    fn remove_all(&self, key: String) -> BoxFuture<'_, Result<Vec<Vec<u8>>, ProtocolError>> {
        self.values(MultiMapRequest::RemoveAll { key }).boxed()
    }

    fn contains_entry(
        &self,
        key: String,
        value: Vec<u8>,
    ) -> BoxFuture<'_, Result<bool, ProtocolError>> {
        async move {
            match self
                .call(MultiMapRequest::ContainsEntry { key, value })
                .await?
            {
                MultiMapResponse::Contains { contains } => Ok(contains),
                other => Err(unexpected::<MultiMap>(other)),
            }
        }
        .boxed()
    }

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>> {
        async move {
            match self.call(MultiMapRequest::Len).await? {
                MultiMapResponse::Len { len } => Ok(len),
                other => Err(unexpected::<MultiMap>(other)),
            }
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(MultiMapRequest::Clear).await? {
                MultiMapResponse::Cleared => Ok(()),
                other => Err(unexpected::<MultiMap>(other)),
            }
        }
        .boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<MultiMapEntry>, ProtocolError>> {
        async move {
            match self.call(MultiMapRequest::Entries).await? {
                MultiMapResponse::Entries { entries } => Ok(entries),
                other => Err(unexpected::<MultiMap>(other)),
            }
        }
        .boxed()
    }
}
