//! Resolution error types

use thiserror::Error;

use super::literal::LiteralError;
use super::share::ClientVariant;

/// Coarse classification of an attempt failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The page no longer matches the expected markup, or the service
    /// refused the derived parameters (usually a wrong password)
    ProtocolMismatch,
    /// Transport failure, timeout or an HTTP error status
    Network,
    Cancelled,
}

/// Why a single client-variant attempt failed
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {error}")]
    Network { url: String, error: reqwest::Error },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("page did not match the {0} pattern")]
    PatternMiss(&'static str),

    #[error("script fragment rejected: {0}")]
    Literal(#[from] LiteralError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("hosting service rejected the request: {0}")]
    Rejected(String),

    #[error("no usable redirect: {0}")]
    Unresolved(String),

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::Network { .. } | ResolveError::Status { .. } => ErrorKind::Network,
            ResolveError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::ProtocolMismatch,
        }
    }
}

/// A failed attempt, tagged with the variant that was tried
#[derive(Debug, Error)]
#[error("{variant}: {cause}")]
pub struct ResolutionError {
    pub variant: ClientVariant,
    #[source]
    pub cause: ResolveError,
}

/// Errors surfaced to callers of the failover orchestrator
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid share link: {0:?}")]
    Input(String),

    #[error("all client variants failed ({})", join_attempts(.0))]
    Failover(Vec<ResolutionError>),

    #[error("resolution cancelled")]
    Cancelled,
}

fn join_attempts(attempts: &[ResolutionError]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Metadata probe failures. These never invalidate the resolved link.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HEAD {url} failed: {error}")]
    Network { url: String, error: reqwest::Error },

    #[error("HEAD {url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("response has no {0} header")]
    MissingHeader(&'static str),

    #[error("Content-Disposition carries no filename: {0:?}")]
    NoFilename(String),

    #[error("invalid Content-Length: {0:?}")]
    InvalidLength(String),
}
