//! Machine à états d'une exécution du pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// États d'une exécution
///
/// `Idle → Fetching → Filtering → Scoring → Enqueuing → Finalizing → Idle`,
/// avec `Aborted` atteignable depuis tout état non-idle sur une erreur de
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Fetching,
    Filtering,
    Scoring,
    Enqueuing,
    Finalizing,
    Aborted,
}

impl RunState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunState::Idle | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Filtering => "filtering",
            RunState::Scoring => "scoring",
            RunState::Enqueuing => "enqueuing",
            RunState::Finalizing => "finalizing",
            RunState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}
