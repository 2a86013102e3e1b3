use thiserror::Error;

/// AniDB traffic that cannot be classified into an outcome
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Datagram or body could not be decoded
    #[error("Malformed AniDB response: {message}")]
    Malformed { message: String },

    /// Reply code the request kind does not know
    #[error("Unexpected AniDB reply {code}: {message}")]
    ServerError { code: u16, message: String },

    /// HTTP client could not be built or used
    #[error("HTTP client error: {message}")]
    Http { message: String },
}

impl ProtocolError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn server_error(code: u16, message: &str) -> Self {
        Self::ServerError {
            code,
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
        }
    }
}
