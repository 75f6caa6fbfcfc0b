//! Error types for the teamcal ingestion core.

use thiserror::Error;

/// Errors that can occur during calendar ingestion.
#[derive(Error, Debug)]
pub enum TeamcalError {
    /// The feed could not be fetched: network failure or non-2xx status.
    #[error("Transport error fetching ICS feed: {message}")]
    Transport {
        /// HTTP status code, when the request got far enough to have one.
        status: Option<u16>,
        message: String,
    },

    #[error("ICS parse error: {0}")]
    Parse(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Calendar source not found: {0}")]
    NotFound(String),
}

/// Result type alias for teamcal operations.
pub type TeamcalResult<T> = Result<T, TeamcalError>;
