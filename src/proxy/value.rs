use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        Primitive as _, PrimitiveKind, PrimitiveSpec, Value, Version,
        value::{ValueRequest, ValueResponse, VersionedValue},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait ValueServer: PrimitiveProxy {
    /// Writes `value`; with `prev_version`, only if the current version matches. Returns the new
    /// version.
    fn set(
        &self,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<Version, ProtocolError>>;

    fn get(&self) -> BoxFuture<'_, Result<Option<VersionedValue>, ProtocolError>>;

    fn delete(
        &self,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<VersionedValue, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct ValueProxy {
    session: Session,
}

pub fn new_value_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<ValueProxy, ProtocolError> {
    Ok(ValueProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl ValueProxy {
    async fn call(&self, request: ValueRequest) -> Result<ValueResponse, ProtocolError> {
        self.session.execute::<Value>(request).await
    }
}

impl PrimitiveProxy for ValueProxy {
    fn kind(&self) -> PrimitiveKind {
        Value::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl ValueServer for ValueProxy {
    fn set(
        &self,
        value: Vec<u8>,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<Version, ProtocolError>> {
        async move {
            match self
                .call(ValueRequest::Set {
                    value,
                    prev_version,
                })
                .await?
            {
                ValueResponse::Set { version, .. } => Ok(version),
                other => Err(unexpected::<Value>(other)),
            }
        }
        .boxed()
    }

    fn get(&self) -> BoxFuture<'_, Result<Option<VersionedValue>, ProtocolError>> {
        async move {
            match self.call(ValueRequest::Get).await? {
                ValueResponse::Get { value } => Ok(value),
                other => Err(unexpected::<Value>(other)),
            }
        }
        .boxed()
    }

    fn delete(
        &self,
        prev_version: Option<Version>,
    ) -> BoxFuture<'_, Result<VersionedValue, ProtocolError>> {
        async move {
            match self.call(ValueRequest::Delete { prev_version }).await? {
                ValueResponse::Deleted { value } => Ok(value),
                other => Err(unexpected::<Value>(other)),
            }
        }
        .boxed()
    }
}
