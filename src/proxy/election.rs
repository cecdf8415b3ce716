use std::sync::Arc;

use futures_util::{FutureExt as _, future::BoxFuture};

use super::{PrimitiveProxy, Session};
use crate::{
    primitive::{
        LeaderElection, Primitive as _, PrimitiveKind, PrimitiveSpec,
        election::{ElectionRequest, Term},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

pub trait LeaderElectionServer: PrimitiveProxy {
    /// Join the election. The first candidate becomes leader.
    fn enter(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>>;

    /// Leave voluntarily. Withdrawing a non-candidate is a no-op.
    fn withdraw(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>>;

    /// Make `candidate` leader immediately.
    fn anoint(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>>;

    /// Move `candidate` one place up the queue.
    fn promote(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>>;

    /// Remove `candidate`; unlike `withdraw`, an unknown candidate is `not_found`.
    fn evict(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>>;

    fn get_term(&self) -> BoxFuture<'_, Result<Term, ProtocolError>>;
}

#[derive(Debug, Clone)]
pub struct LeaderElectionProxy {
    session: Session,
}

pub fn new_leader_election_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<LeaderElectionProxy, ProtocolError> {
    Ok(LeaderElectionProxy {
        session: Session::open(protocol, spec)?,
    })
}

impl LeaderElectionProxy {
    async fn call(&self, request: ElectionRequest) -> Result<Term, ProtocolError> {
        Ok(self.session.execute::<LeaderElection>(request).await?.term)
    }
}

impl PrimitiveProxy for LeaderElectionProxy {
    fn kind(&self) -> PrimitiveKind {
        LeaderElection::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl LeaderElectionServer for LeaderElectionProxy {
    fn enter(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::Enter { candidate }).boxed()
    }

    fn withdraw(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::Withdraw { candidate }).boxed()
    }

    fn anoint(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::Anoint { candidate }).boxed()
    }

    fn promote(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::Promote { candidate }).boxed()
    }

    fn evict(&self, candidate: String) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::Evict { candidate }).boxed()
    }

    fn get_term(&self) -> BoxFuture<'_, Result<Term, ProtocolError>> {
        self.call(ElectionRequest::GetTerm).boxed()
    }
}
