use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File or socket failure, with the path or endpoint involved
#[derive(Error, Debug)]
#[error("{}", describe(self))]
pub struct IoError {
    pub kind: IoErrorKind,
    pub path: Option<PathBuf>,
    /// `host:port` of the remote side
    pub endpoint: Option<String>,
    #[source]
    pub source: Option<io::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    NotFound,
    PermissionDenied,
    /// Resolution, bind or connection failure
    Network,
    Other,
}

impl From<io::ErrorKind> for IoErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::AddrInUse
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable => Self::Network,
            _ => Self::Other,
        }
    }
}

impl IoError {
    pub fn from_std(source: io::Error) -> Self {
        Self {
            kind: source.kind().into(),
            path: None,
            endpoint: None,
            source: Some(source),
        }
    }

    /// Failure talking to `endpoint`
    pub fn network(endpoint: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            kind: IoErrorKind::Network,
            path: None,
            endpoint: Some(endpoint.into()),
            source,
        }
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

fn describe(error: &IoError) -> String {
    let what = match error.kind {
        IoErrorKind::NotFound => "Not found",
        IoErrorKind::PermissionDenied => "Permission denied",
        IoErrorKind::Network => "Network error",
        IoErrorKind::Other => "I/O error",
    };
    let mut text = what.to_string();
    if let Some(path) = &error.path {
        text.push_str(&format!(": {}", path.display()));
    }
    if let Some(endpoint) = &error.endpoint {
        text.push_str(&format!(" talking to {endpoint}"));
    }
    if let Some(source) = &error.source {
        text.push_str(&format!(" ({source})"));
    }
    text
}
