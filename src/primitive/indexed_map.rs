use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind, Version, VersionSeq, check_version};

pub type Index = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub index: Index,
    pub key: String,
    pub value: Vec<u8>,
    pub version: Version,
}

/// Insertion-ordered map. Every appended key receives the next index; indexes are never reused.
#[derive(Debug, Default)]
pub struct IndexedMap {
    by_index: BTreeMap<Index, IndexedEntry>,
    by_key: HashMap<String, Index>,
    last_index: Index,
    versions: VersionSeq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IndexedMapRequest {
    Append {
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
    GetIndex {
        index: Index,
    },
    First,
    Last,
    Next {
        index: Index,
    },
    Prev {
        index: Index,
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
pub enum IndexedMapResponse {
    /// Result of append, update and remove.
    Entry { entry: IndexedEntry },
    /// Result of the lookup queries.
    Get { entry: Option<IndexedEntry> },
    Len { len: usize },
    Cleared,
    Entries { entries: Vec<IndexedEntry> },
}

impl IndexedMap {
    fn lookup(&self, key: &str) -> Result<&IndexedEntry, PrimitiveError> {
        self.by_key
            .get(key)
            .and_then(|index| self.by_index.get(index))
            .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))
    }

    fn found(entry: Option<&IndexedEntry>) -> IndexedMapResponse {
        IndexedMapResponse::Get {
            entry: entry.cloned(),
        }
    }
}

impl Primitive for IndexedMap {
    const KIND: PrimitiveKind = PrimitiveKind::IndexedMap;

    type Request = IndexedMapRequest;
    type Response = IndexedMapResponse;

    fn is_pristine(&self) -> bool {
        self.last_index == 0 && self.versions.is_fresh()
    }

    fn apply(&mut self, request: IndexedMapRequest) -> Result<IndexedMapResponse, PrimitiveError> {
        match request {
            IndexedMapRequest::Append { key, value } => {
                if self.by_key.contains_key(&key) {
                    return Err(PrimitiveError::already_exists(format!(
                        "key {key:?} already exists"
                    )));
                }
                self.last_index += 1;
                let entry = IndexedEntry {
                    index: self.last_index,
                    key: key.clone(),
                    value,
                    version: self.versions.next(),
                };
                self.by_key.insert(key, entry.index);
                self.by_index.insert(entry.index, entry.clone());
                Ok(IndexedMapResponse::Entry { entry })
            }
            IndexedMapRequest::Update {
                key,
                value,
                prev_version,
            } => {
                let current = self.lookup(&key)?;
                check_version(&key, prev_version, current.version)?;
                let index = current.index;
                let version = self.versions.next();
                let entry = self
                    .by_index
                    .get_mut(&index)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                entry.value = value;
                entry.version = version;
                Ok(IndexedMapResponse::Entry {
                    entry: entry.clone(),
                })
            }
            IndexedMapRequest::Get { key } => Ok(Self::found(
                self.by_key
                    .get(&key)
                    .and_then(|index| self.by_index.get(index)),
            )),
            IndexedMapRequest::GetIndex { index } => Ok(Self::found(self.by_index.get(&index))),
            IndexedMapRequest::First => Ok(Self::found(self.by_index.values().next())),
            IndexedMapRequest::Last => Ok(Self::found(self.by_index.values().next_back())),
            IndexedMapRequest::Next { index } => Ok(Self::found(
                self.by_index
                    .range(index.saturating_add(1)..)
                    .map(|(_, e)| e)
                    .next(),
            )),
            IndexedMapRequest::Prev { index } => Ok(Self::found(
                self.by_index.range(..index).map(|(_, e)| e).next_back(),
            )),
            IndexedMapRequest::Remove { key, prev_version } => {
                let current = self.lookup(&key)?;
                check_version(&key, prev_version, current.version)?;
                let index = current.index;
                self.by_key.remove(&key);
                let entry = self
                    .by_index
                    .remove(&index)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                Ok(IndexedMapResponse::Entry { entry })
            }
            IndexedMapRequest::Len => Ok(IndexedMapResponse::Len {
                len: self.by_index.len(),
            }),
            IndexedMapRequest::Clear => {
                self.by_index.clear();
                self.by_key.clear();
                Ok(IndexedMapResponse::Cleared)
            }
            IndexedMapRequest::Entries => Ok(IndexedMapResponse::Entries {
                entries: self.by_index.values().cloned().collect(),
            }),
        }
    }
}
