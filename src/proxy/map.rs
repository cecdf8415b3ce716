use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        Map, Primitive as _, PrimitiveKind, PrimitiveSpec, Version,
        map::{MapEntry, MapRequest, MapResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait MapServer: PrimitiveProxy {
    /// Upsert. With `prev_version` the write only succeeds against that exact version.
    fn put(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>>;

    /// Fails with `already_exists` if `key` is present.
    fn insert(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<MapEntry, ProtocolError>>;

    /// Fails with `not_found` if `key` is absent.
    fn update(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>>;

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<MapEntry>, ProtocolError>>;

    fn remove(
        &self,
        key: String,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>>;

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    /// All entries in key order.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<MapEntry>, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct MapProxy {
    session: Session,
}

pub fn new_map_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<MapProxy, ProtocolError> {
    Ok(MapProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl MapProxy {
    async fn call(&self, request: MapRequest) -> Result<MapResponse, ProtocolError> {
        self.session.execute::<Map>(request).await
    }

    async fn written(&self, request: MapRequest) -> Result<MapEntry, ProtocolError> {
        match self.call(request).await? {
            MapResponse::Written { entry, .. } => Ok(entry),
            other => Err(unexpected::<Map>(other)),
        }
    }
}

impl PrimitiveProxy for MapProxy {
    fn kind(&self) -> PrimitiveKind {
        Map::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl MapServer for MapProxy {
    fn put(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>> {
        self.written(MapRequest::Put {
            key,
            value,
            prev_version,
        })
        .boxed()
    }

    fn insert(&self, key: String, value: Vec<u8>) -> BoxFuture<'_, Result<MapEntry, ProtocolError>> {
        self.written(MapRequest::Insert { key, value }).boxed()
    }

    fn update(
        &self,
        key: String,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>> {
        self.written(MapRequest::Update {
            key,
            value,
            prev_version,
        })
        .boxed()
    }

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<MapEntry>, ProtocolError>> {
        async move {
            match self.call(MapRequest::Get { key }).await? {
                MapResponse::Get { entry } => Ok(entry),
                other => Err(unexpected::<Map>(other)),
            }
        }
        .boxed()
    }

    fn remove(
        &self,
        key: String,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<MapEntry, ProtocolError>> {
        async move {
            match self.call(MapRequest::Remove { key, prev_version }).await? {
                MapResponse::Removed { entry } => Ok(entry),
                other => Err(unexpected::<Map>(other)),
            }
        }
        .boxed()
    }

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>> {
        async move {
            match self.call(MapRequest::Len).await? {
                MapResponse::Len { len } => Ok(len),
                other => Err(unexpected::<Map>(other)),
            }
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(MapRequest::Clear).await? {
                MapResponse::Cleared => Ok(()),
                other => Err(unexpected::<Map>(other)),
            }
        }
        .boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<MapEntry>, ProtocolError>> {
        async move {
            match self.call(MapRequest::Entries).await? {
                MapResponse::Entries { entries } => Ok(entries),
                other => Err(unexpected::<Map>(other)),
            }
        }
        .boxed()
    }
}
