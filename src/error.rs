//! Error taxonomy for the two-stage lookup.
//!
//! `LookupError` describes why a single remote call failed. `OrchestratorError` is what
//! presentation layers receive: every failure of a pipeline ends up as one of its variants.

use serde::Serialize;
use thiserror::Error;

/// Failure of one remote call (stage 1 or stage 2).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("unexpected response: {0}")]
    Parse(String),
}

/// Which remote call an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Detail,
    /// A rejected command; no remote call was involved.
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("location lookup failed: {0}")]
    ResolveFailed(#[source] LookupError),
    #[error("no locations found for the given name")]
    NoCandidates,
    #[error("a choice between matching locations is still pending")]
    AmbiguousUnresolved,
    #[error("the selected location is not one of the offered choices")]
    InvalidSelection,
    #[error("there is no pending choice to select from")]
    SelectionNotExpected,
    #[error("forecast fetch failed: {0}")]
    DetailFetchFailed(#[source] LookupError),
}

impl OrchestratorError {
    pub fn stage(&self) -> Stage {
        match self {
            OrchestratorError::ResolveFailed(_) | OrchestratorError::NoCandidates => Stage::Resolve,
            OrchestratorError::DetailFetchFailed(_) => Stage::Detail,
            OrchestratorError::AmbiguousUnresolved
            | OrchestratorError::InvalidSelection
            | OrchestratorError::SelectionNotExpected => Stage::Selection,
        }
    }

    /// Stable machine-readable tag, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::ResolveFailed(LookupError::Transport(_))
            | OrchestratorError::DetailFetchFailed(LookupError::Transport(_)) => "transport_error",
            OrchestratorError::ResolveFailed(LookupError::Http(_))
            | OrchestratorError::DetailFetchFailed(LookupError::Http(_)) => "http_error",
            OrchestratorError::ResolveFailed(LookupError::Parse(_))
            | OrchestratorError::DetailFetchFailed(LookupError::Parse(_)) => "parse_error",
            OrchestratorError::NoCandidates => "no_candidates",
            OrchestratorError::AmbiguousUnresolved => "ambiguous_unresolved",
            OrchestratorError::InvalidSelection => "invalid_selection",
            OrchestratorError::SelectionNotExpected => "selection_not_expected",
        }
    }
}
