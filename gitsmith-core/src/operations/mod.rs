//! Built-in GitHub operations.
//!
//! - [`user`] - `get_user`
//! - [`repos`] - `list_repositories`, `create_repository`
//! - [`files`] - `get_file`, `put_file`
//! - [`sync`] - `sync_project`, `create_repository_and_sync`

pub mod files;
pub mod repos;
pub mod sync;
pub mod user;

use std::sync::Arc;

use serde_json::{Value, json};

use crate::github::{ApiError, RepoRef, Repository};
use crate::operation::Operation;
use crate::schema::{Arguments, ArgumentsExt, InvalidArgument};

pub use files::{GetFile, PutFile};
pub use repos::{CreateRepository, ListRepositories};
pub use sync::{CreateRepositoryAndSync, SyncProject};
pub use user::GetUser;

/// Longest repository name GitHub accepts.
const MAX_REPO_NAME: usize = 100;

/// Every built-in operation.
pub fn builtin() -> Vec<Arc<dyn Operation>> {
    vec![
        Arc::new(GetUser::new()),
        Arc::new(ListRepositories::new()),
        Arc::new(CreateRepository::new()),
        Arc::new(GetFile::new()),
        Arc::new(PutFile::new()),
        Arc::new(SyncProject::new()),
        Arc::new(CreateRepositoryAndSync::new()),
    ]
}

impl From<InvalidArgument> for ApiError {
    fn from(err: InvalidArgument) -> Self {
        ApiError::Input {
            field: err.field,
            reason: err.reason,
        }
    }
}

/// Normalized view of a repository.
pub(crate) fn repository_summary(repo: &Repository) -> Value {
    json!({
        "name": repo.name,
        "full_name": repo.full_name,
        "private": repo.private,
        "description": repo.description,
        "html_url": repo.html_url,
        "default_branch": repo.default_branch,
    })
}

/// Parse an `owner/name` argument.
pub(crate) fn repo_arg(args: &Arguments, field: &str) -> Result<RepoRef, InvalidArgument> {
    let value = args.require_str(field)?;
    RepoRef::parse(value)
        .ok_or_else(|| InvalidArgument::new(field, format!("expected owner/name, got `{}`", value)))
}

pub(crate) fn validate_repo_name(field: &str, name: &str) -> Result<(), InvalidArgument> {
    if name.len() > MAX_REPO_NAME {
        return Err(InvalidArgument::new(
            field,
            format!("must be at most {} characters", MAX_REPO_NAME),
        ));
    }
    if name == "." || name == ".." {
        return Err(InvalidArgument::new(field, "is reserved"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(InvalidArgument::new(
            field,
            format!("contains invalid character `{}`", bad),
        ));
    }
    Ok(())
}

/// Repository paths are relative, `/`-separated and never escape the root.
pub(crate) fn validate_repo_path(field: &str, path: &str) -> Result<(), InvalidArgument> {
    if path.starts_with('/') || path.contains('\\') {
        return Err(InvalidArgument::new(
            field,
            "must be a relative path using `/` separators",
        ));
    }
    if path.split('/').any(|s| s == "..") {
        return Err(InvalidArgument::new(field, "must not contain `..`"));
    }
    if path.ends_with('/') {
        return Err(InvalidArgument::new(field, "must name a file"));
    }
    Ok(())
}

/// Check an optional string argument against a fixed set of values.
pub(crate) fn validate_choice(
    args: &Arguments,
    field: &str,
    choices: &[&str],
) -> Result<(), InvalidArgument> {
    match args.get_str(field) {
        Some(value) if !choices.contains(&value) => Err(InvalidArgument::new(
            field,
            format!("must be one of {}", choices.join(", ")),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_repo_name_rules() {
        assert!(validate_repo_name("name", "my-project_v2.0").is_ok());
        assert!(validate_repo_name("name", "has space").is_err());
        assert!(validate_repo_name("name", "..").is_err());
        assert!(validate_repo_name("name", &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_repo_path_rules() {
        assert!(validate_repo_path("path", "src/main.rs").is_ok());
        assert!(validate_repo_path("path", "/etc/passwd").is_err());
        assert!(validate_repo_path("path", "docs/../../x").is_err());
        assert!(validate_repo_path("path", "docs/").is_err());
    }

    #[test]
    fn test_repo_arg() {
        let repo = repo_arg(&args(json!({"repository": "octo/demo"})), "repository").unwrap();
        assert_eq!(repo.to_string(), "octo/demo");

        let err = repo_arg(&args(json!({"repository": "demo"})), "repository").unwrap_err();
        assert_eq!(err.field, "repository");
    }

    #[test]
    fn test_validate_choice() {
        let choices = ["public", "private"];
        assert!(validate_choice(&args(json!({})), "visibility", &choices).is_ok());
        assert!(validate_choice(&args(json!({"visibility": "private"})), "visibility", &choices).is_ok());
        let err = validate_choice(&args(json!({"visibility": "secret"})), "visibility", &choices)
            .unwrap_err();
        assert_eq!(err.reason, "must be one of public, private");
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let ops = builtin();
        let mut names: Vec<_> = ops.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ops.len());
    }
}
