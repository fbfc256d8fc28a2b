//! # gitsmith core
//!
//! Credential lifecycle and operation dispatch for GitHub repository
//! management.
//!
//! This crate provides:
//! - A [`CredentialResolver`] that caches a delegated access token and
//!   refreshes it before it expires, sharing one refresh between concurrent
//!   callers
//! - A [`CredentialSource`] boundary with a connector-service client and a
//!   personal-access-token source
//! - An [`OperationRegistry`] of GitHub operations with typed input schemas
//! - A [`Dispatcher`] that validates, executes and maps every outcome to an
//!   [`OperationResult`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gitsmith_core::{ClientOptions, ConnectorClient, ConnectorSettings, Dispatcher, OperationRequest};
//!
//! let settings = ConnectorSettings::from_env()?;
//! let dispatcher = Dispatcher::connect(&ClientOptions::default(), |http| {
//!     ConnectorClient::new(settings, http)
//! })?;
//!
//! let result = dispatcher
//!     .execute(OperationRequest::new("create_repository").with_arg("name", "demo"))
//!     .await;
//! ```

pub mod connector;
pub mod credential;
pub mod dispatcher;
pub mod error;
pub mod github;
pub mod operation;
pub mod operations;
pub mod registry;
pub mod resolver;
pub mod schema;

// Re-export commonly used types at crate root
pub use connector::{
    AuthError,
    ConnectorClient,
    ConnectorSettings,
    CredentialSource,
    StaticTokenSource,
};

pub use credential::{
    Credential,
    Secret,
};

pub use dispatcher::{
    ClientOptions,
    Dispatcher,
};

pub use error::GitsmithError;

pub use github::{
    ApiError,
    GitHubClient,
    RepoRef,
};

pub use operation::{
    ErrorKind,
    Failure,
    Operation,
    OperationRequest,
    OperationResult,
};

pub use registry::{
    OperationDescriptor,
    OperationRegistry,
    UnknownOperation,
};

pub use resolver::{
    CredentialResolver,
    ResolverState,
    TokenProvider,
};

pub use schema::{
    Arguments,
    FieldSpec,
    FieldType,
    InputSchema,
    InvalidArgument,
};
