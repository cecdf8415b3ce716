use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiMapEntry {
    pub key: String,
    pub values: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct MultiMap {
    entries: BTreeMap<String, BTreeSet<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MultiMapRequest {
    Put { key: String, value: Vec<u8> },
    PutAll { key: String, values: Vec<Vec<u8>> },
    Get { key: String },
    Remove { key: String, value: Vec<u8> },
    RemoveAll { key: String },
    ContainsEntry { key: String, value: Vec<u8> },
    Len,
    Clear,
    Entries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MultiMapResponse {
    /// `true` when the write changed the map.
    Updated { updated: bool },
    Values { values: Vec<Vec<u8>> },
    Contains { contains: bool },
    Len { len: usize },
    Cleared,
    Entries { entries: Vec<MultiMapEntry> },
}

impl Primitive for MultiMap {
    const KIND: PrimitiveKind = PrimitiveKind::MultiMap;

    type Request = MultiMapRequest;
    type Response = MultiMapResponse;

    fn is_pristine(&self) -> bool {
        self.entries.is_empty()
    }

    fn apply(&mut self, request: MultiMapRequest) -> Result<MultiMapResponse, PrimitiveError> {
        match request {
            MultiMapRequest::Put { key, value } => Ok(MultiMapResponse::Updated {
                updated: self.entries.entry(key).or_default().insert(value),
            }),
            MultiMapRequest::PutAll { key, values } => {
                if values.is_empty() {
                    return Err(PrimitiveError::invalid_argument("put_all without values"));
                }
                let set = self.entries.entry(key).or_default();
                let mut updated = false;
                for value in values {
                    updated |= set.insert(value);
                }
                Ok(MultiMapResponse::Updated { updated })
            }
            MultiMapRequest::Get { key } => Ok(MultiMapResponse::Values {
                values: self
                    .entries
                    .get(&key)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default(),
            }),
            MultiMapRequest::Remove { key, value } => {
                let Some(set) = self.entries.get_mut(&key) else {
                    return Ok(MultiMapResponse::Updated { updated: false });
                };
                let updated = set.remove(&value);
                if set.is_empty() {
                    self.entries.remove(&key);
                }
                Ok(MultiMapResponse::Updated { updated })
            }
            MultiMapRequest::RemoveAll { key } => Ok(MultiMapResponse::Values {
                values: self
                    .entries
                    .remove(&key)
                    .map(|set| set.into_iter().collect())
                    .unwrap_or_default(),
            }),
            MultiMapRequest::ContainsEntry { key, value } => Ok(MultiMapResponse::Contains {
                contains: self
                    .entries
                    .get(&key)
                    .is_some_and(|set| set.contains(&value)),
            }),
            MultiMapRequest::Len => Ok(MultiMapResponse::Len {
                len: self.entries.values().map(BTreeSet::len).sum(),
            }),
            MultiMapRequest::Clear => {
                self.entries.clear();
                Ok(MultiMapResponse::Cleared)
            }
            MultiMapRequest::Entries => Ok(MultiMapResponse::Entries {
                entries: self
                    .entries
                    .iter()
                    .map(|(key, set)| MultiMapEntry {
                        key: key.clone(),
                        values: set.iter().cloned().collect(),
                    })
                    .collect(),
            }),
        }
    }
}
