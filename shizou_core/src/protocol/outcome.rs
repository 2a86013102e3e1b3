//! Classification of a remote call's result

use serde::{Deserialize, Serialize};

/// Result of one rate-limited remote operation
///
/// Only `Success` carries data. The other variants describe how the owning
/// processor must react.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// Recognized success payload
    Success(T),
    /// Expected "not found" or "already exists" style answer
    Negative(String),
    /// The server banned this client
    Ban { reason: String },
    /// Systemic failure; the processor pauses until an operator intervenes
    Fatal(String),
    /// Network hiccup; the command fails, the processor carries on
    TransientError(String),
}

impl<T> Outcome<T> {
    /// Transform the success payload
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Negative(reason) => Outcome::Negative(reason),
            Self::Ban { reason } => Outcome::Ban { reason },
            Self::Fatal(reason) => Outcome::Fatal(reason),
            Self::TransientError(reason) => Outcome::TransientError(reason),
        }
    }

    /// Keep the classification, drop the payload
    pub fn discard(self) -> Outcome<()> {
        self.map(|_| ())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Success payload, if any
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Negative(_) => "negative",
            Self::Ban { .. } => "ban",
            Self::Fatal(_) => "fatal",
            Self::TransientError(_) => "transient",
        }
    }
}

/// A non-success outcome that ends an envelope early
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interrupt {
    Negative(String),
    Ban(String),
    Fatal(String),
    Transient(String),
}

impl<T> From<Interrupt> for Outcome<T> {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Negative(reason) => Outcome::Negative(reason),
            Interrupt::Ban(reason) => Outcome::Ban { reason },
            Interrupt::Fatal(reason) => Outcome::Fatal(reason),
            Interrupt::Transient(reason) => Outcome::TransientError(reason),
        }
    }
}

impl Interrupt {
    /// Split an outcome into its payload or the interrupt it carries
    pub(crate) fn split<T>(outcome: Outcome<T>) -> Result<T, Interrupt> {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Negative(reason) => Err(Interrupt::Negative(reason)),
            Outcome::Ban { reason } => Err(Interrupt::Ban(reason)),
            Outcome::Fatal(reason) => Err(Interrupt::Fatal(reason)),
            Outcome::TransientError(reason) => Err(Interrupt::Transient(reason)),
        }
    }
}
