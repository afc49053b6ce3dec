use crate::checkin::CheckInError;
use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the checkin-config library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("check-in rejected: {0}")]
    CheckIn(#[from] CheckInError),

    #[error("configuration has already been resolved for this context")]
    AlreadyResolved,
}
