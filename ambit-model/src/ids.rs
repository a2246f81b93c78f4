use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strongly typed identifier for a scanning campaign ("program" in
/// bug-bounty parlance). Threaded through every event and ingest call.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct ProgramId(pub Uuid);

impl Default for ProgramId {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramId {
    pub fn new() -> Self {
        ProgramId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ProgramId {
    fn from(value: Uuid) -> Self {
        ProgramId(value)
    }
}

impl FromStr for ProgramId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ProgramId)
    }
}
