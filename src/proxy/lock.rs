use std::{sync::Arc, time::Duration};

use futures_util::{FutureExt as _, future::BoxFuture};
use tokio::time::Instant;
use tracing::debug;

use super::{PrimitiveProxy, Session, unexpected};
use crate::{
    id::new_session_id,
    primitive::{
        Lock, Primitive as _, PrimitiveKind, PrimitiveSpec, Version,
        lock::{LockRequest, LockResponse},
    },
    protocol::{Connection, ProtocolClient, ProtocolError},
};

const INITIAL_BACKOFF_MS: u64 = 20;
const MAX_BACKOFF_MS: u64 = 500;
const JITTER_MS: u64 = 20;

pub trait LockServer: PrimitiveProxy {
    /// Block until the lock is acquired or `timeout` elapses. `None`, or a timeout too large to
    /// represent as a deadline, waits forever.
    fn lock(&self, timeout: Option<Duration>) -> BoxFuture<'_, Result<Version, ProtocolError>>;

    /// A single attempt. `None` when another owner holds the lock.
    fn try_lock(&self) -> BoxFuture<'_, Result<Option<Version>, ProtocolError>>;

    /// Fails with `conflict` unless this proxy holds the lock.
    fn unlock(&self) -> BoxFuture<'_, Result<(), ProtocolError>>;

    /// Version of the current holder's acquisition, whoever holds it.
    fn get_lock(&self) -> BoxFuture<'_, Result<Option<Version>, ProtocolError>>;
}

/// Each proxy is its own lock owner; clones share the owner token.
#[derive(Debug, Clone)]
pub struct LockProxy {
    session: Session,
    owner: String,
}

pub fn new_lock_proxy(
    protocol: &ProtocolClient,
    spec: &PrimitiveSpec,
) -> Result<LockProxy, ProtocolError> {
    Ok(LockProxy {
        session: Session::open(protocol, spec)?,
        owner: new_session_id(),
    })
}

impl LockProxy {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    async fn call(&self, request: LockRequest) -> Result<LockResponse, ProtocolError> {
        self.session.execute::<Lock>(request).await
    }

    async fn attempt(&self) -> Result<Option<Version>, ProtocolError> {
        match self
            .call(LockRequest::TryAcquire {
                owner: self.owner.clone(),
            })
            .await?
        {
            LockResponse::Acquired { version } => Ok(Some(version)),
            LockResponse::Busy => Ok(None),
            other => Err(unexpected::<Lock>(other)),
        }
    }

    async fn acquire(&self, timeout: Option<Duration>) -> Result<Version, ProtocolError> {
        // A timeout past the end of the clock waits forever.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut delay_ms = INITIAL_BACKOFF_MS;
        loop {
            if let Some(version) = self.attempt().await? {
                return Ok(version);
            }

            let jitter = rand::random::<u64>() % JITTER_MS;
            let mut wait = Duration::from_millis(delay_ms + jitter);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ProtocolError::Timeout { operation: "lock" });
                }
                wait = wait.min(deadline - now);
            }
            debug!(
                primitive = self.session.name(),
                wait_ms = wait.as_millis() as u64,
                "lock busy"
            );
            tokio::time::sleep(wait).await;
            delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
        }
    }
}

impl PrimitiveProxy for LockProxy {
    fn kind(&self) -> PrimitiveKind {
        Lock::KIND
    }

    fn name(&self) -> &str {
        self.session.name()
    }

    fn connection(&self) -> &Arc<Connection> {
        self.session.connection()
    }
}

impl LockServer for LockProxy {
    fn lock(&self, timeout: Option<Duration>) -> BoxFuture<'_, Result<Version, ProtocolError>> {
        self.acquire(timeout).boxed()
    }

    fn try_lock(&self) -> BoxFuture<'_, Result<Option<Version>, ProtocolError>> {
        self.attempt().boxed()
    }

    fn unlock(&self) -> BoxFuture<'_, Result<(), ProtocolError>> {
        async move {
            match self
                .call(LockRequest::Release {
                    owner: self.owner.clone(),
                })
                .await?
            {
                LockResponse::Released => Ok(()),
                other => Err(unexpected::<Lock>(other)),
            }
        }
        .boxed()
    }

    fn get_lock(&self) -> BoxFuture<'_, Result<Option<Version>, ProtocolError>> {
        async move {
            match self.call(LockRequest::Get).await? {
                LockResponse::Status { version } => Ok(version),
                other => Err(unexpected::<Lock>(other)),
            }
        }
        .boxed()
    }
}
