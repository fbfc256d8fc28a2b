//! Operation dispatch.
//!
//! [`Dispatcher::execute`] is the single entry point front-ends call. It looks
//! the operation up, validates the arguments, obtains a credential, runs the
//! operation and folds every error into a typed [`Failure`]. It never retries;
//! [`Dispatcher::execute_with_reauth`] is the one bounded retry policy offered
//! on top, for tokens GitHub rejects right after they were issued.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use gitsmith_core::{ClientOptions, Dispatcher, OperationRequest, StaticTokenSource};
//!
//! let source = StaticTokenSource::from_env()?;
//! let dispatcher = Dispatcher::connect(&ClientOptions::default(), |_| source)?;
//!
//! let result = dispatcher
//!     .execute(OperationRequest::new("list_repositories"))
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::connector::{AuthError, CredentialSource};
use crate::credential::Credential;
use crate::error::GitsmithError;
use crate::github::{self, ApiError, GitHubClient};
use crate::operation::{ErrorKind, Failure, OperationRequest, OperationResult};
use crate::registry::{OperationRegistry, UnknownOperation};
use crate::resolver::{CredentialResolver, DEFAULT_REFRESH_SKEW_SECS, TokenProvider};
use crate::schema::{Arguments, InvalidArgument};

impl From<UnknownOperation> for Failure {
    fn from(err: UnknownOperation) -> Self {
        Failure::new(ErrorKind::UnknownOperation, err.to_string(), false)
    }
}

impl From<InvalidArgument> for Failure {
    fn from(err: InvalidArgument) -> Self {
        Failure::new(ErrorKind::InvalidInput, err.to_string(), false)
    }
}

impl From<AuthError> for Failure {
    fn from(err: AuthError) -> Self {
        let retryable = err.is_retryable();
        Failure::new(ErrorKind::AuthFailure, err.to_string(), retryable)
    }
}

impl From<ApiError> for Failure {
    fn from(err: ApiError) -> Self {
        let (kind, retryable) = match &err {
            ApiError::Status { status, .. } => match status {
                401 | 403 => (ErrorKind::AuthFailure, true),
                404 => (ErrorKind::NotFound, false),
                409 | 422 => (ErrorKind::Conflict, false),
                408 | 429 => (ErrorKind::Upstream, true),
                500..=599 => (ErrorKind::Upstream, true),
                _ => (ErrorKind::Upstream, false),
            },
            ApiError::Transport { .. } => (ErrorKind::Network, true),
            ApiError::Decode { .. } => (ErrorKind::Upstream, false),
            ApiError::Input { .. } => (ErrorKind::InvalidInput, false),
        };
        Failure::new(kind, err.to_string(), retryable)
    }
}

/// HTTP settings for [`Dispatcher::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// GitHub API base URL.
    pub github_api_url: String,

    /// Timeout for every HTTP call (connector and GitHub).
    pub timeout: Duration,

    /// How long before expiry a credential is refreshed.
    pub refresh_skew: chrono::Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            github_api_url: github::DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(github::DEFAULT_TIMEOUT_SECS),
            refresh_skew: chrono::Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
        }
    }
}

/// Outcome of one attempt, with the credential GitHub rejected if any.
struct Attempt {
    result: OperationResult,
    rejected: Option<Credential>,
}

impl Attempt {
    fn failed(failure: impl Into<Failure>) -> Self {
        Self {
            result: OperationResult::Failure(failure.into()),
            rejected: None,
        }
    }
}

/// Routes operation requests to registered operations.
pub struct Dispatcher {
    registry: OperationRegistry,
    tokens: Arc<dyn TokenProvider>,
    github: GitHubClient,
}

impl Dispatcher {
    /// Create a dispatcher from its collaborators.
    pub fn new(
        registry: OperationRegistry,
        tokens: Arc<dyn TokenProvider>,
        github: GitHubClient,
    ) -> Self {
        Self {
            registry,
            tokens,
            github,
        }
    }

    /// Build a dispatcher with the default registry and a resolver over the
    /// source produced by `make_source`.
    ///
    /// `make_source` receives the shared HTTP client so connector calls carry
    /// the same timeout as GitHub calls.
    pub fn connect<S, F>(options: &ClientOptions, make_source: F) -> Result<Self, GitsmithError>
    where
        S: CredentialSource + 'static,
        F: FnOnce(reqwest::Client) -> S,
    {
        let http = github::http_client(options.timeout)?;
        let github = GitHubClient::new(&options.github_api_url, http.clone())?;
        let resolver = CredentialResolver::new(make_source(http)).with_skew(options.refresh_skew);

        Ok(Self::new(
            OperationRegistry::with_defaults(),
            Arc::new(resolver),
            github,
        ))
    }

    /// The operations this dispatcher can run.
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Run one request.
    pub async fn execute(&self, request: OperationRequest) -> OperationResult {
        self.dispatch(&request).await.result
    }

    /// Run an operation by name.
    pub async fn execute_named(&self, name: &str, arguments: Arguments) -> OperationResult {
        self.execute(OperationRequest::new(name).with_arguments(arguments))
            .await
    }

    /// Run one request, retrying once if GitHub rejects the credential.
    ///
    /// On a 401/403 the rejected credential is invalidated so the resolver
    /// refreshes it, and the request is run a second time. A second
    /// rejection is returned as non-retryable.
    pub async fn execute_with_reauth(&self, request: OperationRequest) -> OperationResult {
        let first = self.dispatch(&request).await;
        let Some(rejected) = first.rejected else {
            return first.result;
        };

        if !self.tokens.invalidate(&rejected) {
            debug!("Rejected credential was already replaced");
        }
        info!("Retrying {} with a refreshed token", request.name);

        let second = self.dispatch(&request).await;
        match second.result {
            OperationResult::Failure(mut failure) if second.rejected.is_some() => {
                failure.retryable = false;
                failure.message = format!("{} (rejected again after token refresh)", failure.message);
                OperationResult::Failure(failure)
            }
            other => other,
        }
    }

    async fn dispatch(&self, request: &OperationRequest) -> Attempt {
        let operation = match self.registry.lookup(&request.name) {
            Ok(operation) => operation,
            Err(e) => {
                warn!("Rejected request: {}", e);
                return Attempt::failed(e);
            }
        };

        if let Err(e) = operation.validate(&request.arguments) {
            warn!("Rejected {} request: {}", request.name, e);
            return Attempt::failed(e);
        }

        let credential = match self.tokens.token().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!("No credential for {}: {}", request.name, e);
                return Attempt::failed(e);
            }
        };

        debug!("Executing {}", request.name);
        match operation
            .execute(&self.github, &credential, &request.arguments)
            .await
        {
            Ok(payload) => {
                info!("{} succeeded", request.name);
                Attempt {
                    result: OperationResult::success(payload),
                    rejected: None,
                }
            }
            Err(e) => {
                let rejected = matches!(e.status(), Some(401 | 403)).then_some(credential);
                let failure = Failure::from(e);
                warn!("{} failed: {}", request.name, failure);
                Attempt {
                    result: OperationResult::Failure(failure),
                    rejected,
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("github", &self.github.base_url().as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> Failure {
        Failure::from(ApiError::Status {
            status: code,
            message: "x".to_string(),
        })
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (401, ErrorKind::AuthFailure, true),
            (403, ErrorKind::AuthFailure, true),
            (404, ErrorKind::NotFound, false),
            (409, ErrorKind::Conflict, false),
            (422, ErrorKind::Conflict, false),
            (429, ErrorKind::Upstream, true),
            (500, ErrorKind::Upstream, true),
            (503, ErrorKind::Upstream, true),
            (400, ErrorKind::Upstream, false),
        ];
        for (code, kind, retryable) in cases {
            let failure = status(code);
            assert_eq!(failure.kind, kind, "status {}", code);
            assert_eq!(failure.retryable, retryable, "status {}", code);
        }
    }

    #[test]
    fn test_transport_and_input_mapping() {
        let failure = Failure::from(ApiError::Transport {
            message: "timed out".to_string(),
            timed_out: true,
        });
        assert_eq!(failure.kind, ErrorKind::Network);
        assert!(failure.retryable);

        let failure = Failure::from(ApiError::input("path", "is a directory"));
        assert_eq!(failure.kind, ErrorKind::InvalidInput);
        assert!(!failure.retryable);
    }

    #[test]
    fn test_auth_error_mapping_keeps_retryability() {
        let failure = Failure::from(AuthError::Network {
            message: "reset".to_string(),
        });
        assert_eq!(failure.kind, ErrorKind::AuthFailure);
        assert!(failure.retryable);

        let failure = Failure::from(AuthError::MissingConfig {
            name: "GITSMITH_CONNECTOR_ID".to_string(),
        });
        assert!(!failure.retryable);
    }
}
