use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind};

#[derive(Debug, Default)]
pub struct Set {
    elements: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SetRequest {
    Add { element: String },
    Remove { element: String },
    Contains { element: String },
    Len,
    Clear,
    Elements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SetResponse {
    Added,
    Removed,
    Contains { contains: bool },
    Len { len: usize },
    Cleared,
    Elements { elements: Vec<String> },
}

impl Primitive for Set {
    const KIND: PrimitiveKind = PrimitiveKind::Set;

    type Request = SetRequest;
    type Response = SetResponse;

    fn is_pristine(&self) -> bool {
        self.elements.is_empty()
    }

    fn apply(&mut self, request: SetRequest) -> Result<SetResponse, PrimitiveError> {
        match request {
            SetRequest::Add { element } => {
                if self.elements.contains(&element) {
                    return Err(PrimitiveError::already_exists(format!(
                        "element {element:?} already exists"
                    )));
                }
                self.elements.insert(element);
                Ok(SetResponse::Added)
            }
            SetRequest::Remove { element } => {
                if !self.elements.remove(&element) {
                    return Err(PrimitiveError::not_found(format!(
                        "element {element:?} not found"
                    )));
                }
                Ok(SetResponse::Removed)
            }
            SetRequest::Contains { element } => Ok(SetResponse::Contains {
                contains: self.elements.contains(&element),
            }),
            SetRequest::Len => Ok(SetResponse::Len {
                len: self.elements.len(),
            }),
            SetRequest::Clear => {
                self.elements.clear();
                Ok(SetResponse::Cleared)
            }
            SetRequest::Elements => Ok(SetResponse::Elements {
                elements: self.elements.iter().cloned().collect(),
            }),
        }
    }
}
