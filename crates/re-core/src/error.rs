//! # AppError
//!
//! Centralized error handling for the RateEverything data-access layer.
//! Every public service operation either resolves or fails with one of these.

use thiserror::Error;

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced entity absent (e.g., Rating, ForumPost)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Malformed input (e.g., rating out of range, empty title, review too long)
    #[error("validation error: {0}")]
    Validation(String),

    /// Mutation attempted by someone other than the owner
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Resource already exists (e.g., a second rating for the same item and user)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored document could not be mapped to or from its record type
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Backing store failure (e.g., connection dropped, I/O error)
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }
}

/// A specialized Result type for RateEverything logic.
pub type Result<T> = std::result::Result<T, AppError>;
