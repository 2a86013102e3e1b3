//! Library errors
//!
//! Expected protocol conditions (negative results, bans, server refusals) are
//! not errors: they travel as [`crate::protocol::Outcome`] values. `Error`
//! covers the unexpected faults that remain.

use thiserror::Error;

pub mod internal;
pub mod io;
pub mod protocol;
pub mod validation;

pub use self::internal::InternalError;
pub use self::io::{IoError, IoErrorKind};
pub use self::protocol::ProtocolError;
pub use self::validation::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Files and sockets
    #[error(transparent)]
    Io(#[from] IoError),

    /// AniDB traffic that could not be classified
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Rejected input, before any I/O
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage, stored payloads, hashing
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(InternalError::database(err.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(InternalError::serialization(err.to_string()))
    }
}
