use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session};
use crate::{
    primitive::{Counter, Primitive as _, PrimitiveKind, PrimitiveSpec, counter::CounterRequest},
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait CounterServer: PrimitiveProxy {
    fn set(&self, value: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    fn get(&self) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    /// Returns the value after the increment.
    fn increment(&self, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    fn decrement(&self, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;

    /// Set to `update` only if the counter currently holds `check`.
    fn update(&self, check: i64, update: i64) -> BoxFuture<'_, Result<i64, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct CounterProxy {
    session: Session,
}

pub fn new_counter_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<CounterProxy, ProtocolError> {
    Ok(CounterProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl CounterProxy {
    async fn call(&self, request: CounterRequest) -> Result<i64, ProtocolError> {
        Ok(self.session.execute::<Counter>(request).await?.value)
    }
}

impl PrimitiveProxy for CounterProxy {
    fn kind(&self) -> PrimitiveKind {
        Counter::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl CounterServer for CounterProxy {
    fn set(&self, value: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.call(CounterRequest::Set { value }).boxed()
    }

    fn get(&self) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.call(CounterRequest::Get).boxed()
    }

    fn increment(&self, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.call(CounterRequest::Increment { delta }).boxed()
    }

    fn decrement(&self, delta: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.call(CounterRequest::Decrement { delta }).boxed()
    }

    fn update(&self, check: i64, update: i64) -> BoxFuture<'_, Result<i64, ProtocolError>> {
        self.call(CounterRequest::Update { check, update }).boxed()
    }
}
