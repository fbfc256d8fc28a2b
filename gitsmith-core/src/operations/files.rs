//! Reading and writing single files through the contents API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::{repo_arg, validate_repo_path};
use crate::credential::Credential;
use crate::github::{ApiError, FileContent, GitHubClient, PutContents};
use crate::operation::Operation;
use crate::schema::{Arguments, ArgumentsExt, FieldSpec, FieldType, InputSchema, InvalidArgument};

/// Decode the base64 body of a contents API file.
///
/// GitHub wraps the encoded content at 60 columns, so whitespace is dropped
/// before decoding.
pub(crate) fn decode_content(file: &FileContent) -> Result<Vec<u8>, ApiError> {
    match file.encoding.as_deref() {
        Some("base64") => {}
        Some("none") => {
            return Err(ApiError::Decode {
                message: format!("{} is too large for the contents API", file.path),
            });
        }
        other => {
            return Err(ApiError::Decode {
                message: format!("unsupported content encoding {:?}", other),
            });
        }
    }

    let compact: String = file
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact.as_bytes()).map_err(|e| ApiError::Decode {
        message: format!("invalid base64 content for {}: {}", file.path, e),
    })
}

/// `get_file`
pub struct GetFile {
    schema: InputSchema,
}

impl GetFile {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::new(vec![
                FieldSpec::required("repository", FieldType::String, "Repository as owner/name"),
                FieldSpec::required("path", FieldType::String, "File path inside the repository"),
                FieldSpec::optional("ref", FieldType::String, "Branch, tag or commit (default branch if omitted)"),
            ]),
        }
    }
}

impl Default for GetFile {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for GetFile {
    fn name(&self) -> &'static str {
        "get_file"
    }

    fn description(&self) -> &'static str {
        "Read a file from a repository"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        repo_arg(args, "repository")?;
        validate_repo_path("path", args.require_str("path")?)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        let repo = repo_arg(args, "repository")?;
        let path = args.require_str("path")?;

        let file = github
            .get_contents(credential, &repo, path, args.get_str("ref"))
            .await?;
        let bytes = decode_content(&file)?;

        Ok(json!({
            "path": file.path,
            "sha": file.sha,
            "size": file.size,
            "content_base64": STANDARD.encode(&bytes),
            "content": String::from_utf8(bytes).ok(),
        }))
    }
}

/// `put_file`
pub struct PutFile {
    schema: InputSchema,
}

impl PutFile {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::new(vec![
                FieldSpec::required("repository", FieldType::String, "Repository as owner/name"),
                FieldSpec::required("path", FieldType::String, "File path inside the repository"),
                FieldSpec::required("content", FieldType::String, "New file content (text)")
                    .allow_blank(),
                FieldSpec::optional("message", FieldType::String, "Commit message"),
                FieldSpec::optional("sha", FieldType::String, "Blob sha of the file being replaced; required for updates"),
                FieldSpec::optional("branch", FieldType::String, "Target branch (default branch if omitted)"),
            ]),
        }
    }
}

impl Default for PutFile {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for PutFile {
    fn name(&self) -> &'static str {
        "put_file"
    }

    fn description(&self) -> &'static str {
        "Create or update a file in a repository"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        repo_arg(args, "repository")?;
        validate_repo_path("path", args.require_str("path")?)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        let repo = repo_arg(args, "repository")?;
        let path = args.require_str("path")?;
        // Content is taken verbatim; surrounding whitespace is significant.
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| InvalidArgument::new("content", "is required"))?;

        let body = PutContents {
            message: args
                .get_str("message")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Update {}", path)),
            content: STANDARD.encode(content.as_bytes()),
            sha: args.get_str("sha").map(str::to_string),
            branch: args.get_str("branch").map(str::to_string),
        };

        let written = github.put_contents(credential, &repo, path, &body).await?;
        tracing::info!("Wrote {} to {} ({})", written.content.path, repo, written.commit.sha);

        Ok(json!({
            "path": written.content.path,
            "sha": written.content.sha,
            "commit_sha": written.commit.sha,
            "html_url": written.content.html_url,
        }))
    }
}
