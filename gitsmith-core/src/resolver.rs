//! Credential lifecycle.
//!
//! [`CredentialResolver`] owns the single active [`Credential`] of the
//! process. It fetches one on first use, refreshes it when it is about to
//! expire, and makes sure concurrent callers share a single refresh.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use gitsmith_core::{CredentialResolver, StaticTokenSource, TokenProvider};
//!
//! let resolver = CredentialResolver::new(StaticTokenSource::from_env()?);
//! let credential = resolver.token().await?;
//! assert!(!credential.is_expired());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::connector::{AuthError, CredentialSource};
use crate::credential::Credential;

/// Default refresh skew in seconds.
///
/// Credentials are refreshed once they are within this many seconds of
/// their expiry.
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

/// Observable lifecycle state of a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No credential has been obtained yet, or the last one was rejected.
    Unauthenticated,
    /// A usable credential is cached.
    Authenticated,
    /// The cached credential is within the skew of its expiry or was invalidated.
    Expired,
    /// A fetch or refresh call is in flight.
    Refreshing,
}

/// Supplies valid credentials to the dispatcher.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a credential whose expiry is strictly in the future.
    async fn token(&self) -> Result<Credential, AuthError>;

    /// Report that GitHub rejected `rejected`.
    ///
    /// Marks the cached credential stale so the next [`token`](Self::token)
    /// call refreshes it. Has no effect, and returns `false`, when the cache
    /// already holds a different credential.
    fn invalidate(&self, rejected: &Credential) -> bool;
}

#[derive(Default)]
struct Cache {
    credential: Option<Credential>,
    stale: bool,
    /// Completed fetch/refresh attempts.
    cycle: u64,
    last_failure: Option<AuthError>,
}

impl Cache {
    fn usable(&self, skew: Duration) -> Option<&Credential> {
        self.credential
            .as_ref()
            .filter(|c| !self.stale && !c.expires_within(skew))
    }
}

/// Raises the refreshing flag for as long as it is alive.
///
/// Dropping it lowers the flag, so a cancelled `token()` future cannot leave
/// the resolver reporting [`ResolverState::Refreshing`].
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Caching, self-refreshing credential holder.
///
/// # Type Parameters
///
/// * `S` - The credential source to fetch and refresh from
pub struct CredentialResolver<S: CredentialSource> {
    source: S,
    skew: Duration,
    cache: RwLock<Cache>,
    refresh_guard: Mutex<()>,
    refreshing: AtomicBool,
}

impl<S: CredentialSource> CredentialResolver<S> {
    /// Create a resolver with the default skew and an empty cache.
    pub fn new(source: S) -> Self {
        Self {
            source,
            skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
            cache: RwLock::new(Cache::default()),
            refresh_guard: Mutex::new(()),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Use a custom refresh skew. Negative values are treated as zero.
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew.max(Duration::zero());
        self
    }

    /// Seed the cache with a credential obtained elsewhere.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.cache.write().credential = Some(credential);
        self
    }

    /// The configured refresh skew.
    pub fn skew(&self) -> Duration {
        self.skew
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResolverState {
        if self.refreshing.load(Ordering::Acquire) {
            return ResolverState::Refreshing;
        }
        let cache = self.cache.read();
        match &cache.credential {
            None => ResolverState::Unauthenticated,
            Some(c) if cache.stale || c.expires_within(self.skew) => ResolverState::Expired,
            Some(_) => ResolverState::Authenticated,
        }
    }

    /// Fetch or refresh the credential. Must be called with the refresh guard held.
    async fn renew(&self) -> Result<Credential, AuthError> {
        let current = self.cache.read().credential.clone();

        let flag = RefreshingFlag::raise(&self.refreshing);
        let outcome = match &current {
            Some(credential) => {
                tracing::info!("Access token expired or invalidated, attempting refresh");
                self.source.refresh(credential).await
            }
            None => {
                tracing::info!("No credential cached, fetching connection metadata");
                match self.source.fetch().await {
                    Ok(fetched) if fetched.expires_within(self.skew) => {
                        tracing::debug!("Fetched credential is already stale, refreshing");
                        self.source.refresh(&fetched).await
                    }
                    other => other,
                }
            }
        };
        drop(flag);

        let outcome = outcome.and_then(|credential| {
            if credential.is_expired() {
                Err(AuthError::Malformed {
                    message: format!("connector issued a token that expired at {}", credential.expires_at),
                })
            } else {
                Ok(credential)
            }
        });

        let mut cache = self.cache.write();
        cache.cycle += 1;
        match outcome {
            Ok(credential) => {
                tracing::info!(
                    "Obtained access token valid until {}",
                    credential.expires_at
                );
                cache.credential = Some(credential.clone());
                cache.stale = false;
                cache.last_failure = None;
                Ok(credential)
            }
            Err(e) => {
                tracing::warn!("Failed to obtain access token: {}", e);
                if !e.is_retryable() {
                    // The refresh token is no good; start over from connection metadata.
                    cache.credential = None;
                    cache.stale = false;
                }
                cache.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<S: CredentialSource + 'static> TokenProvider for CredentialResolver<S> {
    async fn token(&self) -> Result<Credential, AuthError> {
        let observed_cycle = {
            let cache = self.cache.read();
            if let Some(credential) = cache.usable(self.skew) {
                tracing::debug!("Using cached access token");
                return Ok(credential.clone());
            }
            cache.cycle
        };

        let _guard = self.refresh_guard.lock().await;

        {
            // A refresh finished while we waited; share its outcome.
            let cache = self.cache.read();
            if cache.cycle != observed_cycle {
                if let Some(credential) = cache.usable(self.skew) {
                    return Ok(credential.clone());
                }
                if let Some(err) = &cache.last_failure {
                    return Err(err.clone());
                }
            }
        }

        self.renew().await
    }

    fn invalidate(&self, rejected: &Credential) -> bool {
        let mut cache = self.cache.write();
        let matches = cache
            .credential
            .as_ref()
            .is_some_and(|c| c.access_token == rejected.access_token);
        if matches {
            tracing::debug!("Cached access token was rejected, marking stale");
            cache.stale = true;
        }
        matches
    }
}
