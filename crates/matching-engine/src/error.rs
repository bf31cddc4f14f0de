//! Matching engine error types

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while checking for matches
///
/// These never cross the public `check_*` boundary; the engine converts
/// them into an empty result and a warning.
#[derive(Error, Debug)]
pub enum MatchingError {
    /// The data store rejected or failed the query
    #[error("Query failed: {0}")]
    Query(#[from] StoreError),

    /// The owning page context was torn down while the query was in flight
    #[error("Engine disposed")]
    Disposed,
}

pub type MatchingResult<T> = Result<T, MatchingError>;
