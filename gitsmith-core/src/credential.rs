//! Delegated credentials.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`Credential`] - The access/refresh token pair held by the resolver

use chrono::{DateTime, Duration, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the memory is zeroed when the secret is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// An access token obtained on the caller's behalf, with the refresh token
/// needed to renew it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Token sent as `Authorization: Bearer` on GitHub calls.
    pub access_token: Secret,

    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,

    /// Token presented to the connector to obtain a new access token.
    pub refresh_token: Secret,
}

impl Credential {
    /// Create a new credential.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token),
            expires_at,
            refresh_token: Secret::new(refresh_token),
        }
    }

    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the access token expires within `skew` from now.
    ///
    /// A credential for which this returns `false` has an expiry strictly in
    /// the future for any non-negative skew.
    pub fn expires_within(&self, skew: Duration) -> bool {
        Utc::now() >= self.expires_at - skew
    }

    /// Remaining lifetime, clamped at zero.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).max(Duration::zero())
    }
}
