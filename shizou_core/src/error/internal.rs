use thiserror::Error;

/// Faults inside the library itself: storage, stored payloads, hashing
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("Database error: {message}")]
    Database { message: String },

    /// A stored or outgoing payload could not be converted
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Hashing failed: {message}")]
    Hashing { message: String },

    #[error("Invariant violated: {message}")]
    Invariant { message: String },
}

impl InternalError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
