use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        IndexedMap, Primitive as _, PrimitiveKind, PrimitiveSpec, Version,
        indexed_map::{Index, IndexedEntry, IndexedMapRequest, IndexedMapResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait IndexedMapServer: PrimitiveProxy {
    /// Adds `key` at the next index. Fails with `already_exists` if `key` is present.
    fn append(
        &self,
        key: String,
        value: Vec<u8>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>>;

    fn update(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>>;

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    fn get_index(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    fn first(&self) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    fn last(&self) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    /// First entry after `index`.
    fn next(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    /// Last entry before `index`.
    fn prev(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>>;

    fn remove(
        &self,
        key: String,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>>;

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    fn entries(&self) -> BoxFuture<'_, Result<Vec<IndexedEntry>, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct IndexedMapProxy {
    session: Session,
}

pub fn new_indexed_map_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<IndexedMapProxy, ProtocolError> {
    Ok(IndexedMapProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl IndexedMapProxy {
    async fn call(&self, request: IndexedMapRequest) -> Result<IndexedMapResponse, ProtocolError> {
        self.session.execute::<IndexedMap>(request).await
    }

    async fn entry(&self, request: IndexedMapRequest) -> Result<IndexedEntry, ProtocolError> {
        match self.call(request).await? {
            IndexedMapResponse::Entry { entry } => Ok(entry),
            other => Err(unexpected::<IndexedMap>(other)),
        }
    }

    async fn lookup(
        &self,
        request: IndexedMapRequest,
    ) -> Result<Option<IndexedEntry>, ProtocolError> {
        match self.call(request).await? {
            IndexedMapResponse::Get { entry } => Ok(entry),
            other => Err(unexpected::<IndexedMap>(other)),
        }
    }
}

impl PrimitiveProxy for IndexedMapProxy {
    fn kind(&self) -> PrimitiveKind {
        IndexedMap::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl IndexedMapServer for IndexedMapProxy {
    fn append(
        &self,
        key: String,
        value: Vec<u8>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>> {
        self.entry(IndexedMapRequest::Append { key, value }).boxed()
    }

    fn update(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>> {
        self.entry(IndexedMapRequest::Update {
            key,
            value,
            prev_version,
        })
        .boxed()
    }

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::Get { key }).boxed()
    }

    fn get_index(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::GetIndex { index }).boxed()
    }

    fn first(&self) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::First).boxed()
    }

    fn last(&self) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::Last).boxed()
    }

    fn next(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::Next { index }).boxed()
    }

    fn prev(&self, index: Index) -> BoxFuture<'_, Result<Option<IndexedEntry>, ProtocolError>> {
        self.lookup(IndexedMapRequest::Prev { index }).boxed()
    }

    fn remove(
        &self,
        key: String,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<IndexedEntry, ProtocolError>> {
        self.entry(IndexedMapRequest::Remove { key, prev_version })
            .boxed()
    }

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>> {
        async move {
            match self.call(IndexedMapRequest::Len).await? {
                IndexedMapResponse::Len { len } => Ok(len),
                other => Err(unexpected::<IndexedMap>(other)),
            }
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(IndexedMapRequest::Clear).await? {
                IndexedMapResponse::Cleared => Ok(()),
                other => Err(unexpected::<IndexedMap>(other)),
            }
        }
        .boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<IndexedEntry>, ProtocolError>> {
        async move {
            match self.call(IndexedMapRequest::Entries).await? {
                IndexedMapResponse::Entries { entries } => Ok(entries),
                other => Err(unexpected::<IndexedMap>(other)),
            }
        }
        .boxed()
    }
}
