//! Protocol layer shared by the storage node and the protocol client: partition topology, the
//! HTTP wire contract and the client that sends primitive operations to the partition leader.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    network::{Address, NetworkError},
    primitive::{PrimitiveError, PrimitiveKind},
};

pub mod client;

pub use client::{Connection, ProtocolClient, ProtocolOptions};

pub type PartitionId = u32;

pub const DEFAULT_PARTITION_ID: PartitionId = 1;

pub const HEALTH_PATH: &str = "/v1/health";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub partition_id: PartitionId,
    /// `host:port` of the node that serves this partition.
    pub leader: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub partitions: Vec<PartitionConfig>,
}

impl ProtocolConfig {
    /// A topology of one partition led by `leader`.
    pub fn single_partition(partition_id: PartitionId, leader: &Address) -> Self {
        Self {
            partitions: vec![PartitionConfig {
                partition_id,
                leader: leader.to_string(),
            }],
        }
    }

    /// Check the topology holds exactly one partition and parse its leader address.
    pub fn validate(&self) -> Result<(PartitionId, Address), ProtocolError> {
        let partition = match self.partitions.as_slice() {
            [] => return Err(ProtocolError::invalid_config("no partitions configured")),
            [partition] => partition,
            partitions => {
                return Err(ProtocolError::invalid_config(format!(
                    "exactly one partition is supported, got {}",
                    partitions.len()
                )));
            }
        };
        let leader = partition
            .leader
            .parse::<Address>()
            .map_err(|e| ProtocolError::invalid_config(e.to_string()))?;
        Ok((partition.partition_id, leader))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub address: String,
    pub partitions: Vec<PartitionId>,
    pub started_at: String,
}

/// Error envelope returned by the node for request-level failures (bad partition, bad body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug)]
pub enum ProtocolError {
    NotConnected,
    AlreadyConnected,
    /// The connection this handle was created against has been closed.
    Closed,
    InvalidConfig {
        reason: String,
    },
    Handshake {
        partition_id: PartitionId,
        reason: String,
    },
    Network(NetworkError),
    Transport(reqwest::Error),
    Status {
        status: u16,
        code: String,
        message: String,
    },
    Primitive(PrimitiveError),
    UnexpectedResponse {
        kind: PrimitiveKind,
        response: String,
    },
    Timeout {
        operation: &'static str,
    },
}

impl ProtocolError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The primitive-level error, if the node rejected the operation itself.
    pub fn primitive(&self) -> Option<&PrimitiveError> {
        match self {
            Self::Primitive(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "protocol client is not connected"),
            Self::AlreadyConnected => write!(f, "protocol client is already connected"),
            Self::Closed => write!(f, "protocol connection is closed"),
            Self::InvalidConfig { reason } => write!(f, "invalid protocol config: {reason}"),
            Self::Handshake {
                partition_id,
                reason,
            } => write!(f, "partition {partition_id} handshake failed: {reason}"),
            Self::Network(e) => write!(f, "{e}"),
            Self::Transport(e) => write!(f, "protocol transport error: {e}"),
            Self::Status {
                status,
                code,
                message,
            } => write!(f, "node returned {status} ({code}): {message}"),
            Self::Primitive(e) => write!(f, "{e}"),
            Self::UnexpectedResponse { kind, response } => {
                write!(f, "unexpected {kind} response: {response}")
            }
            Self::Timeout { operation } => write!(f, "{operation} timed out"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Network(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Primitive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NetworkError> for ProtocolError {
    fn from(value: NetworkError) -> Self {
        Self::Network(value)
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

impl From<PrimitiveError> for ProtocolError {
    fn from(value: PrimitiveError) -> Self {
        Self::Primitive(value)
    }
}
