use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMapEntry {
    pub key: String,
    pub value: i64,
}

#[derive(Debug, Default)]
pub struct CounterMap {
    counters: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CounterMapRequest {
    Set {
        key: String,
        value: i64,
    },
    Insert {
        key: String,
        value: i64,
    },
    Update {
        key: String,
        value: i64,
        prev_value: i64,
    },
    Get {
        key: String,
    },
    Increment {
        key: String,
        delta: i64,
    },
    Decrement {
        key: String,
        delta: i64,
    },
    Remove {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prev_value: Option<i64>,
    },
    Len,
    Clear,
    Entries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CounterMapResponse {
    /// Result of `set` and `update`: the value the key held before the write.
    Prev { prev_value: Option<i64> },
    /// Result of `increment` and `decrement`: the value after the write.
    Value { value: i64 },
    Get { value: Option<i64> },
    Inserted,
    Removed { value: i64 },
    Len { len: usize },
    Cleared,
    Entries { entries: Vec<CounterMapEntry> },
}

impl CounterMap {
    fn add(&mut self, key: String, delta: i64) -> Result<CounterMapResponse, PrimitiveError> {
        let current = self.counters.get(&key).copied().unwrap_or_default();
        let value = current
            .checked_add(delta)
            .ok_or_else(|| PrimitiveError::invalid_argument(format!("counter {key:?} overflow")))?;
        self.counters.insert(key, value);
        Ok(CounterMapResponse::Value { value })
    }
}

impl Primitive for CounterMap {
    const KIND: PrimitiveKind = PrimitiveKind::CounterMap;

    type Request = CounterMapRequest;
    type Response = CounterMapResponse;

    fn is_pristine(&self) -> bool {
        self.counters.is_empty()
    }

    fn apply(&mut self, request: CounterMapRequest) -> Result<CounterMapResponse, PrimitiveError> {
        match request {
            CounterMapRequest::Set { key, value } => Ok(CounterMapResponse::Prev {
                prev_value: self.counters.insert(key, value),
            }),
            CounterMapRequest::Insert { key, value } => {
                if self.counters.contains_key(&key) {
                    return Err(PrimitiveError::already_exists(format!(
                        "key {key:?} already exists"
                    )));
                }
                self.counters.insert(key, value);
                Ok(CounterMapResponse::Inserted)
            }
            CounterMapRequest::Update {
                key,
                value,
                prev_value,
            } => {
                let current = *self
                    .counters
                    .get(&key)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                if current != prev_value {
                    return Err(PrimitiveError::conflict(format!(
                        "key {key:?} holds {current}, expected {prev_value}"
                    )));
                }
                Ok(CounterMapResponse::Prev {
                    prev_value: self.counters.insert(key, value),
                })
            }
            CounterMapRequest::Get { key } => Ok(CounterMapResponse::Get {
                value: self.counters.get(&key).copied(),
            }),
            CounterMapRequest::Increment { key, delta } => self.add(key, delta),
            CounterMapRequest::Decrement { key, delta } => {
                let delta = delta
                    .checked_neg()
                    .ok_or_else(|| PrimitiveError::invalid_argument("delta overflow"))?;
                self.add(key, delta)
            }
            CounterMapRequest::Remove { key, prev_value } => {
                let current = *self
                    .counters
                    .get(&key)
                    .ok_or_else(|| PrimitiveError::not_found(format!("key {key:?} not found")))?;
                match prev_value {
                    Some(expected) if expected != current => {
                        return Err(PrimitiveError::conflict(format!(
                            "key {key:?} holds {current}, expected {expected}"
                        )));
                    }
                    _ => {}
                }
                self.counters.remove(&key);
                Ok(CounterMapResponse::Removed { value: current })
            }
            CounterMapRequest::Len => Ok(CounterMapResponse::Len {
                len: self.counters.len(),
            }),
            CounterMapRequest::Clear => {
                self.counters.clear();
                Ok(CounterMapResponse::Cleared)
            }
            CounterMapRequest::Entries => Ok(CounterMapResponse::Entries {
                entries: self
                    .counters
                    .iter()
                    .map(|(key, value)| CounterMapEntry {
                        key: key.clone(),
                        value: *value,
                    })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> String {
        "hits".to_string()
    }

    #[test]
    fn increment_creates_missing_counters() {
        let mut map = CounterMap::default();
        assert_eq!(
            map.apply(CounterMapRequest::Increment {
                key: key(),
                delta: 2
            })
            .unwrap(),
            CounterMapResponse::Value { value: 2 }
        );
        assert_eq!(
            map.apply(CounterMapRequest::Decrement {
                key: key(),
                delta: 5
            })
            .unwrap(),
            CounterMapResponse::Value { value: -3 }
        );
        assert_eq!(
            map.apply(CounterMapRequest::Get { key: key() }).unwrap(),
            CounterMapResponse::Get { value: Some(-3) }
        );
    }

    #[test]
    fn set_reports_previous_value() {
        let mut map = CounterMap::default();
        assert_eq!(
            map.apply(CounterMapRequest::Set {
                key: key(),
                value: 1
            })
            .unwrap(),
            CounterMapResponse::Prev { prev_value: None }
        );
        assert_eq!(
            map.apply(CounterMapRequest::Set {
                key: key(),
                value: 4
            })
            .unwrap(),
            CounterMapResponse::Prev {
                prev_value: Some(1)
            }
        );
    }

    #[test]
    fn update_and_remove_check_current_value() {
        let mut map = CounterMap::default();
        map.apply(CounterMapRequest::Insert {
            key: key(),
            value: 7,
        })
        .unwrap();

        let err = map
            .apply(CounterMapRequest::Update {
                key: key(),
                value: 8,
                prev_value: 6,
            })
            .unwrap_err();
        assert_eq!(err.code(), "conflict");

        let err = map
            .apply(CounterMapRequest::Remove {
                key: key(),
                prev_value: Some(0),
            })
            .unwrap_err();
        assert_eq!(err.code(), "conflict");

        assert_eq!(
            map.apply(CounterMapRequest::Remove {
                key: key(),
                prev_value: Some(7),
            })
            .unwrap(),
            CounterMapResponse::Removed { value: 7 }
        );
        let err = map
            .apply(CounterMapRequest::Remove {
                key: key(),
                prev_value: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn insert_rejects_existing_key() {
        let mut map = CounterMap::default();
        map.apply(CounterMapRequest::Insert {
            key: key(),
            value: 1,
        })
        .unwrap();
        let err = map
            .apply(CounterMapRequest::Insert {
                key: key(),
                value: 2,
            })
            .unwrap_err();
        assert_eq!(err.code(), "already_exists");
    }
}
