use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind, Version, VersionSeq, check_version};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub version: Version,
}

#[derive(Debug, Default)]
pub struct Map {
    entries: BTreeMap<String, (Vec<u8>, Version)>,
    versions: VersionSeq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapRequest {
    Put {
        key: String,
        value: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_version: Option<Version>,
    },
    Insert {
        key: String,
        value: Vec<u8>,
    },
    Update {
        key: String,
        value: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_version: Option<Version>,
    },
    Get {
        key: String,
    },
    Remove {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_version: Option<Version>,
    },
    Len,
    Clear,
    Entries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MapResponse {
    Written {
        entry: MapEntry,
        prev: Option<MapEntry>,
    },
    Get {
        entry: Option<MapEntry>,
    },
    Removed {
        entry: MapEntry,
    },
    Len {
        len: usize,
    },
    Cleared,
    Entries {
        entries: Vec<MapEntry>,
    },
}

impl Map {
    fn entry(&self, key: &str) -> Option<MapEntry> {
        self.entries.get(key).map(|(value, version)| MapEntry {
            key: key.to_string(),
            value: value.clone(),
            version: *version,
        })
    }

    fn write(&mut self, key: String, value: Vec<u8>) -> MapResponse {
        let prev = self.entry(&key);
        let version = self.versions.next();
        self.entries.insert(key.clone(), (value.clone(), version));
        MapResponse::Written {
            entry: MapEntry {
                key,
                value,
                version,
            },
            prev,
        }
    }
}

impl Primitive for Map {
    const KIND: PrimitiveKind = PrimitiveKind::Map;

    type Request = MapRequest;
    type Response = MapResponse;

    fn is_pristine(&self) -> bool {
        self.entries.is_empty() && self.versions.is_fresh()
    }

    fn apply(&mut self, request: MapRequest) -> Result<MapResponse, PrimitiveError> {
        match request {
            MapRequest::Put {
                key,
                value,
                prev_version,
            } => {
                if let Some(expected) = prev_version {
                    let actual = self.entries.get(&key).map(|(_, v)| *v).ok_or_else(|| {
                        PrimitiveError::conflict(format!("key {key:?} has no version {expected}"))
                    })?;
                    check_version(&key, Some(expected), actual)?;
                }
                Ok(self.write(key, value))
            }
            MapRequest::Insert { key, value } => {
                if self.entries.contains_key(&key) {
                    return Err(PrimitiveError::already_exists(format!(
                        "key {key:?} already exists"
                    )));
                }
                Ok(self.write(key, value))
            }
            MapRequest::Update {
                key,
                value,
                prev_version,
            } => {
                let actual = self
                    .entries
                    .get(&key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                check_version(&key, prev_version, actual)?;
                Ok(self.write(key, value))
            }
            MapRequest::Get { key } => Ok(MapResponse::Get {
                entry: self.entry(&key),
            }),
            MapRequest::Remove { key, prev_version } => {
                let entry = self
                    .entry(&key)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                check_version(&key, prev_version, entry.version)?;
                self.entries.remove(&key);
                Ok(MapResponse::Removed { entry })
            }
            MapRequest::Len => Ok(MapResponse::Len {
                len: self.entries.len(),
            }),
            MapRequest::Clear => {
                self.entries.clear();
                Ok(MapResponse::Cleared)
            }
            MapRequest::Entries => Ok(MapResponse::Entries {
                entries: self
                    .entries
                    .iter()
                    .map(|(key, (value, version))| MapEntry {
                        key: key.clone(),
                        value: value.clone(),
                        version: *version,
                    })
                    .collect(),
            }),
        }
    }
}
