//! Uploading a local project directory into a repository.
//!
//! Files are discovered with [`ignore::WalkBuilder`], so `.gitignore` rules
//! apply and build/VCS directories are skipped. Each changed file becomes one
//! commit, written sequentially: concurrent writes to the same branch would
//! race on the branch head.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ignore::WalkBuilder;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::files::decode_content;
use super::repos::{creation_fields, new_repository, validate_creation};
use super::{repo_arg, repository_summary};
use crate::credential::Credential;
use crate::github::{ApiError, GitHubClient, PutContents, RepoRef};
use crate::operation::Operation;
use crate::schema::{Arguments, ArgumentsExt, FieldSpec, FieldType, InputSchema, InvalidArgument};

/// Largest file uploaded by a sync, in bytes.
pub const MAX_SYNC_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Directories never uploaded.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".mypy_cache",
    ".pytest_cache",
];

#[derive(Debug, Clone)]
pub(crate) struct LocalFile {
    /// Path relative to the source root, `/`-separated.
    pub relative: String,
    pub absolute: PathBuf,
}

/// What a sync did with each file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub synced: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<String>,
}

/// Build and tool output directories sitting directly under the source root.
fn is_excluded_dir(entry: &ignore::DirEntry) -> bool {
    entry.depth() == 1
        && entry.file_type().is_some_and(|ft| ft.is_dir())
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Walk `root` and list the files to upload, sorted by path.
///
/// Oversized files are reported in `skipped` instead.
pub(crate) fn collect_files(root: &Path) -> Result<(Vec<LocalFile>, Vec<String>), ApiError> {
    if !root.is_dir() {
        return Err(ApiError::input(
            "source",
            format!("{} is not a directory", root.display()),
        ));
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| !is_excluded_dir(entry))
        .build();

    let mut files = Vec::new();
    let mut skipped = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > MAX_SYNC_FILE_BYTES {
            warn!("Skipping {} ({} bytes)", relative, size);
            skipped.push(relative);
            continue;
        }

        files.push(LocalFile {
            relative,
            absolute: entry.path().to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    skipped.sort();
    Ok((files, skipped))
}

/// Upload `files` into `repo`, skipping those whose remote copy is identical.
pub(crate) async fn upload(
    github: &GitHubClient,
    credential: &Credential,
    repo: &RepoRef,
    files: &[LocalFile],
    branch: Option<&str>,
    message: Option<&str>,
) -> Result<SyncReport, ApiError> {
    let mut report = SyncReport::default();

    for file in files {
        let local = tokio::fs::read(&file.absolute).await.map_err(|e| {
            ApiError::input(
                "source",
                format!("cannot read {}: {}", file.absolute.display(), e),
            )
        })?;

        let remote = github
            .find_contents(credential, repo, &file.relative, branch)
            .await?;
        if let Some(remote) = &remote {
            if decode_content(remote).is_ok_and(|bytes| bytes == local) {
                debug!("{} is unchanged", file.relative);
                report.unchanged.push(file.relative.clone());
                continue;
            }
        }

        let body = PutContents {
            message: message
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sync {}", file.relative)),
            content: STANDARD.encode(&local),
            sha: remote.map(|r| r.sha),
            branch: branch.map(str::to_string),
        };

        if let Err(e) = github
            .put_contents(credential, repo, &file.relative, &body)
            .await
        {
            warn!(
                "Sync to {} stopped at {} after {} files: {}",
                repo,
                file.relative,
                report.synced.len(),
                e
            );
            return Err(e);
        }
        report.synced.push(file.relative.clone());
    }

    info!(
        "Synced {} files to {} ({} unchanged)",
        report.synced.len(),
        repo,
        report.unchanged.len()
    );
    Ok(report)
}

fn source_dir(args: &Arguments) -> PathBuf {
    PathBuf::from(args.get_str("source").unwrap_or("."))
}

fn validate_source(args: &Arguments) -> Result<(), InvalidArgument> {
    let source = source_dir(args);
    if source.is_dir() {
        Ok(())
    } else {
        Err(InvalidArgument::new(
            "source",
            format!("{} is not a directory", source.display()),
        ))
    }
}

/// `sync_project`
pub struct SyncProject {
    schema: InputSchema,
}

impl SyncProject {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::new(vec![
                FieldSpec::required("repository", FieldType::String, "Existing repository as owner/name"),
                FieldSpec::optional("source", FieldType::String, "Local directory to upload (default .)"),
                FieldSpec::optional("branch", FieldType::String, "Target branch (default branch if omitted)"),
                FieldSpec::optional("message", FieldType::String, "Commit message used for every file"),
            ]),
        }
    }
}

impl Default for SyncProject {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for SyncProject {
    fn name(&self) -> &'static str {
        "sync_project"
    }

    fn description(&self) -> &'static str {
        "Upload the files of a local directory to an existing repository"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        repo_arg(args, "repository")?;
        validate_source(args)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        let repo = repo_arg(args, "repository")?;
        let branch = args.get_str("branch");
        let (files, skipped) = collect_files(&source_dir(args))?;

        let mut report = upload(
            github,
            credential,
            &repo,
            &files,
            branch,
            args.get_str("message"),
        )
        .await?;
        report.skipped = skipped;

        Ok(json!({
            "repository": repo.to_string(),
            "branch": branch,
            "synced": report.synced,
            "unchanged": report.unchanged,
            "skipped": report.skipped,
        }))
    }
}

/// `create_repository_and_sync`
pub struct CreateRepositoryAndSync {
    schema: InputSchema,
}

impl CreateRepositoryAndSync {
    pub fn new() -> Self {
        let mut fields = creation_fields();
        fields.push(FieldSpec::optional(
            "source",
            FieldType::String,
            "Local directory to upload (default .)",
        ));
        fields.push(FieldSpec::optional(
            "message",
            FieldType::String,
            "Commit message used for every file",
        ));
        Self {
            schema: InputSchema::new(fields),
        }
    }
}

impl Default for CreateRepositoryAndSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for CreateRepositoryAndSync {
    fn name(&self) -> &'static str {
        "create_repository_and_sync"
    }

    fn description(&self) -> &'static str {
        "Create a new repository and upload a local directory into it"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        validate_creation(args)?;
        validate_source(args)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        // Walk first so a bad source fails before the repository exists.
        let (files, skipped) = collect_files(&source_dir(args))?;

        let request = new_repository(args, true)?;
        let created = github
            .create_repository(credential, args.get_str("org"), &request)
            .await?;
        info!("Created repository {}", created.full_name);

        let repo = RepoRef::parse(&created.full_name).ok_or_else(|| ApiError::Decode {
            message: format!("unexpected full_name `{}`", created.full_name),
        })?;
        let branch = created
            .default_branch
            .clone()
            .unwrap_or_else(|| "main".to_string());

        let mut report = upload(
            github,
            credential,
            &repo,
            &files,
            Some(branch.as_str()),
            args.get_str("message"),
        )
        .await?;
        report.skipped = skipped;

        Ok(json!({
            "repository": repository_summary(&created),
            "url": created.html_url,
            "branch": branch,
            "synced": report.synced,
            "unchanged": report.unchanged,
            "skipped": report.skipped,
        }))
    }
}
