use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind, Version, VersionSeq, check_version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: Version,
}

/// A single optional register.
#[derive(Debug, Default)]
pub struct Value {
    current: Option<VersionedValue>,
    versions: VersionSeq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ValueRequest {
    Set {
        value: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_version: Option<Version>,
    },
    Get,
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_version: Option<Version>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ValueResponse {
    Set {
        version: Version,
        prev: Option<VersionedValue>,
    },
    Get {
        value: Option<VersionedValue>,
    },
    Deleted {
        value: VersionedValue,
    },
}

impl Primitive for Value {
    const KIND: PrimitiveKind = PrimitiveKind::Value;

    type Request = ValueRequest;
    type Response = ValueResponse;

    fn is_pristine(&self) -> bool {
        self.current.is_none() && self.versions.is_fresh()
    }

    fn apply(&mut self, request: ValueRequest) -> Result<ValueResponse, PrimitiveError> {
        match request {
            ValueRequest::Set {
                value,
                prev_version,
            } => {
                if let Some(expected) = prev_version {
                    let actual = self.current.as_ref().map(|v| v.version).ok_or_else(|| {
                        PrimitiveError::conflict(format!("value has no version {expected}"))
                    })?;
                    check_version("value", Some(expected), actual)?;
                }
                let version = self.versions.next();
                let prev = self.current.replace(VersionedValue { value, version });
                Ok(ValueResponse::Set { version, prev })
            }
            ValueRequest::Get => Ok(ValueResponse::Get {
                value: self.current.clone(),
            }),
            ValueRequest::Delete { prev_version } => {
                let actual = self
                    .current
                    .as_ref()
                    .map(|v| v.version)
                    .ok_or_else(|| PrimitiveError::not_found("value is not set"))?;
                check_version("value", prev_version, actual)?;
                let value = self
                    .current
                    .take()
                    .ok_or_else(|| PrimitiveError::not_found("value is not set"))?;
                Ok(ValueResponse::Deleted { value })
            }
        }
    }
}
