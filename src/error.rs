//! Error types for the hub and the per-connection session handler.

use thiserror::Error;

/// Failures the hub surfaces back to a single caller.
///
/// These never propagate as Rust errors across task boundaries; they are turned into a `->`
/// line in the caller's mailbox by whoever invoked the hub operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("name is taken")]
    NameTaken,
    #[error("name is invalid")]
    NameInvalid,
    #[error("no such name: {0}")]
    NoSuchName(String),
}

/// Errors bubbled out of the SSH session handler.
///
/// These are logged by the connection task and always result in the connection being dropped;
/// there is no retry.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] russh::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
