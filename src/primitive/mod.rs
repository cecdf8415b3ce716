//! In-memory primitive state machines hosted by the storage node.
//!
//! Each primitive kind is a plain data structure plus a serde request/response pair. The node
//! applies requests one at a time per instance; proxies build requests and interpret responses.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub mod counter;
pub mod counter_map;
pub mod election;
pub mod indexed_map;
pub mod lock;
pub mod map;
pub mod multi_map;
pub mod set;
pub mod value;

pub use counter::Counter;
pub use counter_map::CounterMap;
pub use election::LeaderElection;
pub use indexed_map::IndexedMap;
pub use lock::Lock;
pub use map::Map;
pub use multi_map::MultiMap;
pub use set::Set;
pub use value::Value;

/// Monotonic per-instance write version. `0` is never handed out.
pub type Version = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Counter,
    CounterMap,
    Election,
    IndexedMap,
    Lock,
    Map,
    MultiMap,
    Set,
    Value,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 9] = [
        Self::Counter,
        Self::CounterMap,
        Self::Election,
        Self::IndexedMap,
        Self::Lock,
        Self::Map,
        Self::MultiMap,
        Self::Set,
        Self::Value,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::CounterMap => "counter_map",
            Self::Election => "election",
            Self::IndexedMap => "indexed_map",
            Self::Lock => "lock",
            Self::Map => "map",
            Self::MultiMap => "multi_map",
            Self::Set => "set",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the named primitive instance a proxy is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimitiveSpec {
    pub name: String,
}

impl PrimitiveSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Application-level failure returned by a primitive. Travels over the wire inside a successful
/// HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PrimitiveError {
    NotFound { message: String },
    AlreadyExists { message: String },
    Conflict { message: String },
    InvalidArgument { message: String },
}

impl PrimitiveError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::InvalidArgument { .. } => "invalid_argument",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::AlreadyExists { message }
            | Self::Conflict { message }
            | Self::InvalidArgument { message } => message,
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for PrimitiveError {}

pub trait Primitive: Default + Send + 'static {
    const KIND: PrimitiveKind;

    type Request: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static;
    type Response: Serialize + DeserializeOwned + fmt::Debug + Send + 'static;

    /// True while the instance is indistinguishable from `Self::default()`.
    fn is_pristine(&self) -> bool;

    fn apply(&mut self, request: Self::Request) -> Result<Self::Response, PrimitiveError>;
}

/// Hands out strictly increasing versions starting at 1.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct VersionSeq {
    last: Version,
}

impl VersionSeq {
    pub(crate) fn is_fresh(&self) -> bool {
        self.last == 0
    }

    pub(crate) fn next(&mut self) -> Version {
        self.last += 1;
        self.last
    }
}

/// Fails with `Conflict` unless `expected` is absent or equals `actual`.
pub(crate) fn check_version(
    what: &str,
    expected: Option<Version>,
    actual: Version,
) -> Result<(), PrimitiveError> {
    match expected {
        Some(expected) if expected != actual => Err(PrimitiveError::conflict(format!(
            "{what}: expected version {expected}, found {actual}"
        ))),
        _ => Ok(()),
    }
}
