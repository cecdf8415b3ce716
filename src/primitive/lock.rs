use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind, Version, VersionSeq};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Holder {
    owner: String,
    version: Version,
}

/// Exclusive lock keyed by owner token. Waiting is the caller's business: the node only
/// answers whether an attempt won.
#[derive(Debug, Default)]
pub struct Lock {
    holder: Option<Holder>,
    versions: VersionSeq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LockRequest {
    TryAcquire { owner: String },
    Release { owner: String },
    Get,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LockResponse {
    Acquired { version: Version },
    Busy,
    Released,
    Status {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<Version>,
    },
}

impl Primitive for Lock {
    const KIND: PrimitiveKind = PrimitiveKind::Lock;

    type Request = LockRequest;
    type Response = LockResponse;

    fn is_pristine(&self) -> bool {
        self.holder.is_none() && self.versions.is_fresh()
    }

    fn apply(&mut self, request: LockRequest) -> Result<LockResponse, PrimitiveError> {
        match request {
            LockRequest::TryAcquire { owner } => {
                if owner.is_empty() {
                    return Err(PrimitiveError::invalid_argument("lock owner is empty"));
                }
                match &self.holder {
                    Some(holder) if holder.owner == owner => Ok(LockResponse::Acquired {
                        version: holder.version,
                    }),
                    Some(_) => Ok(LockResponse::Busy),
                    None => {
                        let version = self.versions.next();
                        self.holder = Some(Holder { owner, version });
                        Ok(LockResponse::Acquired { version })
                    }
                }
            }
            LockRequest::Release { owner } => match &self.holder {
                Some(holder) if holder.owner == owner => {
                    self.holder = None;
                    Ok(LockResponse::Released)
                }
                Some(_) => Err(PrimitiveError::conflict("lock is held by another owner")),
                None => Err(PrimitiveError::conflict("lock is not held")),
            },
            LockRequest::Get => Ok(LockResponse::Status {
                version: self.holder.as_ref().map(|h| h.version),
            }),
        }
    }
}
