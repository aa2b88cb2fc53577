// ============================================================================
// ERRORS
// ============================================================================
// Per-item errors (GeocodingError, MutationError) are absorbed by the batch
// that produced them. OptimizeError and QueueError reach the caller.
// ============================================================================

use thiserror::Error;

use crate::models::pending_action::ActionKind;

/// Failure to resolve one location reference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodingError {
    #[error("no geocoding result")]
    NoResult,

    #[error("geocoding service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid geocoding response: {0}")]
    InvalidResponse(String),
}

impl GeocodingError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GeocodingError::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("at least 2 resolvable waypoints are required, got {resolved}")]
    InsufficientInput { resolved: usize },

    #[error("geocoding service unreachable for every waypoint")]
    GeocodingUnavailable,

    #[error("duplicated waypoint id: {0}")]
    DuplicateWaypoint(String),
}

/// Failure of one backend mutation. The action stays queued.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u32),

    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("{0} requires a record id in the payload")]
    MissingRecordId(ActionKind),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("storage is not available")]
    Unavailable,

    #[error("could not write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("could not read '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("stored queue is corrupted: {0}")]
    Corrupted(String),

    #[error("could not serialize queue: {0}")]
    Serialize(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("{0} requires a record id in the payload")]
    MissingRecordId(ActionKind),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}
