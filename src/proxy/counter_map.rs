use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        CounterMap, Primitive as _, PrimitiveKind, PrimitiveSpec,
        counter_map::{CounterMapEntry, CounterMapRequest, CounterMapResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait CounterMapServer: PrimitiveProxy {
    /// Returns the previous value of `key`.
    fn set(&self, key: String, value: i64) -> BoxFuture<'_, Result<Option<i64>, ProtocolError>>;

    /// Fails with `already_exists` if `key` is present.
    fn insert(&self, key: String, value: i64) -> BoxFuture<'_, Result<(), ProtocolError>>;

    /// Compare-and-set on a single key.
    fn update(
        &self,
        key: String,
        value: i64,
        prev_value: i64,
    ) -> BoxFuture<'_, Result<(), ProtocolError>>;

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<i64>, ProtocolError>>;

    fn increment(&self, key: String, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    fn decrement(&self, key: String, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    fn remove(
        &self,
        key: String,
        prev_value: Option<i64>,
    ) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    fn entries(&self) -> BoxFuture<'_, Result<Vec<CounterMapEntry>, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct CounterMapProxy {
    session: Session,
}

pub fn new_counter_map_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<CounterMapProxy, ProtocolError> {
    Ok(CounterMapProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl CounterMapProxy {
    async fn call(&self, request: CounterMapRequest) -> Result<CounterMapResponse, ProtocolError> {
        self.session.execute::<CounterMap>(request).await
    }

    async fn prev(&self, request: CounterMapRequest) -> Result<Option<i64>, ProtocolError> {
        match self.call(request).await? {
            CounterMapResponse::Prev { prev_value } => Ok(prev_value),
            other => Err(unexpected::<CounterMap>(other)),
        }
    }

    async fn value(&self, request: CounterMapRequest) -> Result<i64, ProtocolError> {
        match self.call(request).await? {
            CounterMapResponse::Value { value } | CounterMapResponse::Removed { value } => {
                Ok(value)
            }
            other => Err(unexpected::<CounterMap>(other)),
        }
    }
}

impl PrimitiveProxy for CounterMapProxy {
    fn kind(&self) -> PrimitiveKind {
        CounterMap::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl CounterMapServer for CounterMapProxy {
    fn set(&self, key: String, value: i64) -> BoxFuture<'_, Result<Option<i64>, ProtocolError>> {
        self.prev(CounterMapRequest::Set { key, value }).boxed()
    }

    fn insert(&self, key: String, value: i64) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(CounterMapRequest::Insert { key, value }).await? {
                CounterMapResponse::Inserted => Ok(()),
                other => Err(unexpected::<CounterMap>(other)),
            }
        }
        .boxed()
    }

    fn update(
        &self,
        key: String,
        value: i64,
        prev_value: i64,
    ) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            self.prev(CounterMapRequest::Update {
                key,
                value,
                prev_value,
            })
            .await?;
            Ok(())
        }
        .boxed()
    }

    fn get(&self, key: String) -> BoxFuture<'_, Result<Option<i64>, ProtocolError>> {
        async move {
            match self.call(CounterMapRequest::Get { key }).await? {
                CounterMapResponse::Get { value } => Ok(value),
                other => Err(unexpected::<CounterMap>(other)),
            }
        }
        .boxed()
    }

    fn increment(&self, key: String, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.value(CounterMapRequest::Increment { key, delta }).boxed()
    }

    fn decrement(&self, key: String, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.value(CounterMapRequest::Decrement { key, delta }).boxed()
    }

    fn remove(
        &self,
        key: String,
        prev_value: Option<i64>,
    ) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.value(CounterMapRequest::Remove { key, prev_value })
            .boxed()
    }

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>> {
        async move {
            match self.call(CounterMapRequest::Len).await? {
                CounterMapResponse::Len { len } => Ok(len),
                other => Err(unexpected::<CounterMap>(other)),
            }
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(CounterMapRequest::Clear).await? {
                CounterMapResponse::Cleared => Ok(()),
                other => Err(unexpected::<CounterMap>(other)),
            }
        }
        .boxed()
    }

    fn entries(&self) -> BoxFuture<'_, Result<Vec<CounterMapEntry>, ProtocolError>> {
        async move {
            match self.call(CounterMapRequest::Entries).await? {
                CounterMapResponse::Entries { entries } => Ok(entries),
                other => Err(unexpected::<CounterMap>(other)),
            }
        }
        .boxed()
    }
}
