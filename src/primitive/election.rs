use serde::{Deserialize, Serialize};

use super::{Primitive, PrimitiveError, PrimitiveKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Bumped every time a new leader takes office.
    pub term: u64,
    pub leader: Option<String>,
    /// Candidates in priority order; the leader, if any, is first.
    pub candidates: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LeaderElection {
    term: u64,
    candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ElectionRequest {
    Enter { candidate: String },
    Withdraw { candidate: String },
    Anoint { candidate: String },
    Promote { candidate: String },
    Evict { candidate: String },
    GetTerm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResponse {
    pub term: Term,
}

impl LeaderElection {
    fn leader(&self) -> Option<&String> {
        self.candidates.first()
    }

    fn position(&self, candidate: &str) -> Result<usize, PrimitiveError> {
        self.candidates
            .iter()
            .position(|c| c == candidate)
            .ok_or_else(|| PrimitiveError::not_found(format!("{candidate:?} is not a candidate")))
    }

    fn snapshot(&self) -> Term {
        Term {
            term: self.term,
            leader: self.leader().cloned(),
            candidates: self.candidates.clone(),
        }
    }
}

impl Primitive for LeaderElection {
    const KIND: PrimitiveKind = PrimitiveKind::Election;

    type Request = ElectionRequest;
    type Response = ElectionResponse;

    fn is_pristine(&self) -> bool {
        self.term == 0 && self.candidates.is_empty()
    }

    fn apply(&mut self, request: ElectionRequest) -> Result<ElectionResponse, PrimitiveError> {
        let before = self.leader().cloned();
        match request {
            ElectionRequest::Enter { candidate } => {
                if candidate.is_empty() {
                    return Err(PrimitiveError::invalid_argument("candidate id is empty"));
                }
                if !self.candidates.contains(&candidate) {
                    self.candidates.push(candidate);
                }
            }
            ElectionRequest::Withdraw { candidate } => {
                self.candidates.retain(|c| *c != candidate);
            }
            ElectionRequest::Evict { candidate } => {
                let pos = self.position(&candidate)?;
                self.candidates.remove(pos);
            }
            ElectionRequest::Anoint { candidate } => {
                let pos = self.position(&candidate)?;
                let candidate = self.candidates.remove(pos);
                self.candidates.insert(0, candidate);
            }
            ElectionRequest::Promote { candidate } => {
                let pos = self.position(&candidate)?;
                if pos > 0 {
                    self.candidates.swap(pos - 1, pos);
                }
            }
            ElectionRequest::GetTerm => {}
        }

        let after = self.leader();
        if after.is_some() && after != before.as_ref() {
            self.term += 1;
        }
        Ok(ElectionResponse {
            term: self.snapshot(),
        })
    }
}
