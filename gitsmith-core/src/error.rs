//! Top-level error types for gitsmith.

use thiserror::Error;

use crate::connector::AuthError;
use crate::github::ApiError;
use crate::registry::UnknownOperation;
use crate::schema::InvalidArgument;

/// Top-level error type encompassing all gitsmith errors.
#[derive(Debug, Error)]
pub enum GitsmithError {
    /// Error obtaining a credential.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Error from a GitHub API call.
    #[error("GitHub API error: {0}")]
    Api(#[from] ApiError),

    /// Argument validation failed.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    /// Operation lookup failed.
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured URL is invalid.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}
