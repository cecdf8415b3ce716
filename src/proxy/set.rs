use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    primitive::{
        Primitive as _, PrimitiveKind, PrimitiveSpec, Set,
        set::{SetRequest, SetResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait SetServer: PrimitiveProxy {
    /// Fails with `already_exists` if the element is present.
    fn add(&self, element: String) -> BoxFuture<'_, Result<(), ProtocolError>>;

    /// Fails with `not_found` if the element is absent.
    fn remove(&self, element: String) -> BoxFuture<'_, Result<(), ProtocolError>>;

    fn contains(&self, element: String) -> BoxFuture<'_, Result<bool, ProtocolError>>;

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    /// All elements in sorted order.
    fn elements(&self) -> BoxFuture<'_, Result<Vec<String>, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct SetProxy {
    session: Session,
}

pub fn new_set_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<SetProxy, ProtocolError> {
    Ok(SetProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl SetProxy {
    async fn call(&self, request: SetRequest) -> Result<SetResponse, ProtocolError> {
        self.session.execute::<Set>(request).await
    }
}

impl PrimitiveProxy for SetProxy {
    fn kind(&self) -> PrimitiveKind {
        Set::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl SetServer for SetProxy {
    fn add(&self, element: String) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(SetRequest::Add { element }).await? {
                SetResponse::Added => Ok(()),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }

    fn remove(&self, element: String) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(SetRequest::Remove { element }).await? {
                SetResponse::Removed => Ok(()),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }

    fn contains(&self, element: String) -> BoxFuture<'_, Result<bool, ProtocolError>> {
        async move {
            match self.call(SetRequest::Contains { element }).await? {
                SetResponse::Contains { contains } => Ok(contains),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }

    fn len(&self) -> BoxFuture<'_, Result<usize, ProtocolError>> {
        async move {
            match self.call(SetRequest::Len).await? {
                SetResponse::Len { len } => Ok(len),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self.call(SetRequest::Clear).await? {
                SetResponse::Cleared => Ok(()),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }

    fn elements(&self) -> BoxFuture<'_, Result<Vec<String>, ProtocolError>> {
        async move {
            match self.call(SetRequest::Elements).await? {
                SetResponse::Elements { elements } => Ok(elements),
                other => Err(unexpected::<Set>(other)),
            }
        }
        .boxed()
    }
}
