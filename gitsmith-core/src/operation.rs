//! Operation contract and request/result types.
//!
//! This module provides:
//! - [`Operation`] - Trait implemented by every supported GitHub action
//! - [`OperationRequest`] - An operation name plus its arguments
//! - [`OperationResult`] - `Success` with a JSON payload, or a typed [`Failure`]
//! - [`ErrorKind`] - The uniform failure taxonomy

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::Credential;
use crate::github::{ApiError, GitHubClient};
use crate::schema::{Arguments, InputSchema, InvalidArgument};

/// A supported remote action.
///
/// Implementations declare their argument schema and perform the GitHub
/// calls; the dispatcher handles lookup, credentials and error mapping.
///
/// # Example
///
/// ```rust,ignore
/// struct Ping { schema: InputSchema }
///
/// #[async_trait]
/// impl Operation for Ping {
///     fn name(&self) -> &'static str { "ping" }
///     fn description(&self) -> &'static str { "Check the token works" }
///     fn schema(&self) -> &InputSchema { &self.schema }
///
///     async fn execute(&self, github: &GitHubClient, credential: &Credential, _args: &Arguments)
///         -> Result<Value, ApiError>
///     {
///         let user = github.get_user(credential).await?;
///         Ok(json!({ "login": user.login }))
///     }
/// }
/// ```
#[async_trait]
pub trait Operation: Send + Sync {
    /// Unique name the front-end uses to select this operation.
    fn name(&self) -> &'static str;

    /// One-line description for tool catalogues.
    fn description(&self) -> &'static str;

    /// Declared arguments.
    fn schema(&self) -> &InputSchema;

    /// Check arguments before any network call.
    ///
    /// The default checks the schema only; override to add semantic checks
    /// and call the default first.
    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema().validate(args)
    }

    /// Perform the operation and return its normalized payload.
    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError>;
}

/// A request to run one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl OperationRequest {
    /// Create a request with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Replace all arguments.
    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Failure classes reported to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownOperation,
    InvalidInput,
    AuthFailure,
    NotFound,
    Conflict,
    Upstream,
    Network,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownOperation => "unknown_operation",
            Self::InvalidInput => "invalid_input",
            Self::AuthFailure => "auth_failure",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Upstream => "upstream",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Whether re-attempting the same request may succeed unchanged.
    pub retryable: bool,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if self.retryable {
            write!(f, " (retryable)")?;
        }
        Ok(())
    }
}

impl std::error::Error for Failure {}

/// Outcome of one operation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResult {
    Success { payload: Value },
    Failure(Failure),
}

impl OperationResult {
    pub fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self::Failure(Failure::new(kind, message, retryable))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The payload of a success.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure(_) => None,
        }
    }

    /// The failure details, if any.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn into_result(self) -> Result<Value, Failure> {
        match self {
            Self::Success { payload } => Ok(payload),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl From<Failure> for OperationResult {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_deserializes_without_arguments() {
        let request: OperationRequest =
            serde_json::from_value(json!({"name": "get_user"})).unwrap();
        assert_eq!(request, OperationRequest::new("get_user"));
    }

    #[test]
    fn test_request_builder() {
        let request = OperationRequest::new("create_repository")
            .with_arg("name", "demo")
            .with_arg("auto_init", true);
        assert_eq!(request.arguments["name"], "demo");
        assert_eq!(request.arguments["auto_init"], true);
    }

    #[test]
    fn test_result_wire_shape() {
        let ok = OperationResult::success(json!([1, 2]));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "payload": [1, 2]})
        );

        let failed = OperationResult::failure(ErrorKind::NotFound, "missing", false);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "failure", "kind": "not_found", "message": "missing", "retryable": false})
        );

        let back: OperationResult =
            serde_json::from_value(serde_json::to_value(&failed).unwrap()).unwrap();
        assert_eq!(back, failed);
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::new(ErrorKind::Upstream, "GitHub returned 503", true);
        assert_eq!(failure.to_string(), "upstream: GitHub returned 503 (retryable)");
    }

    #[test]
    fn test_into_result() {
        assert!(OperationResult::success(json!(null)).into_result().is_ok());
        let err = OperationResult::failure(ErrorKind::Conflict, "exists", false)
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }
}
