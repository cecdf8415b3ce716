use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind};

#[derive(Debug, Default)]
pub struct Counter {
    value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CounterRequest {
    Set { value: i64 },
    Get,
    Increment { delta: i64 },
    Decrement { delta: i64 },
    /// Compare-and-set: only writes `update` when the current value equals `check`.
    Update { check: i64, update: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterResponse {
    pub value: i64,
}

impl Counter {
    fn add(&mut self, delta: i64) -> Result<i64, PrimitiveError> {
        self.value = self
            .value
            .checked_add(delta)
            .ok_or_else(|| PrimitiveError::invalid_argument("counter overflow"))?;
        Ok(self.value)
    }
}

impl Primitive for Counter {
    const KIND: PrimitiveKind = PrimitiveKind::Counter;

    type Request = CounterRequest;
    type Response = CounterResponse;

    fn is_pristine(&self) -> bool {
        self.value == 0
    }

    fn apply(&mut self, request: CounterRequest) -> Result<CounterResponse, PrimitiveError> {
        let value = match request {
            CounterRequest::Set { value } => {
                self.value = value;
                value
            }
            CounterRequest::Get => self.value,
            CounterRequest::Increment { delta } => self.add(delta)?,
            CounterRequest::Decrement { delta } => {
                let delta = delta
                    .checked_neg()
                    .ok_or_else(|| PrimitiveError::invalid_argument("counter overflow"))?;
                self.add(delta)?
            }
            CounterRequest::Update { check, update } => {
                if self.value != check {
                    return Err(PrimitiveError::conflict(format!(
                        "counter value is {}, expected {check}",
                        self.value
                    )));
                }
                self.value = update;
                update
            }
        };
        Ok(CounterResponse { value })
    }
}
