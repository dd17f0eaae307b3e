//! Engine error types.
//!
//! Defines `SyncError` for all error conditions surfaced by the diff and
//! sync entry points. Nothing is retried or swallowed inside the engine;
//! transient-failure policy belongs to the gateway implementation.
//!
//! Error kinds:
//! - `NotFound`: a required source object is absent
//! - `InvalidTraversal`: walking above a repository root, or below a blob
//! - `UnsupportedOperation`: e.g. pruning a directory entry
//! - `ConfigurationConflict`: e.g. labels with a non-pull-request mode
//! - `Gateway`: a remote call failed
//! - `Internal`: a broken invariant, such as a content-address mismatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid traversal: {0}")]
    InvalidTraversal(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
