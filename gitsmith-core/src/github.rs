//! GitHub REST API client.
//!
//! Thin, typed wrappers over the handful of endpoints the operations need.
//! Every request is authenticated with the caller-supplied [`Credential`];
//! the client itself holds no token.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::credential::Credential;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default timeout applied to every HTTP call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST API version pinned on every request.
const API_VERSION: &str = "2022-11-28";

/// Page size used when listing repositories.
const PER_PAGE: usize = 100;

/// Upper bound on pages fetched by a single listing.
const MAX_PAGES: usize = 100;

const USER_AGENT: &str = concat!("gitsmith/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by the connector and GitHub calls.
pub fn http_client(timeout: std::time::Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Error type for GitHub API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// GitHub answered with a non-success status.
    #[error("GitHub returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (timeout, reset, DNS).
    #[error("network error: {message}")]
    Transport { message: String, timed_out: bool },

    /// A success response whose body did not have the expected shape.
    #[error("unexpected response from GitHub: {message}")]
    Decode { message: String },

    /// An argument turned out to be unusable once the operation ran.
    #[error("invalid {field}: {reason}")]
    Input { field: String, reason: String },
}

impl ApiError {
    /// Build an input error.
    pub fn input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status, when GitHub produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode {
                message: err.to_string(),
            };
        }
        Self::Transport {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// The authenticated user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub public_repos: Option<u64>,
}

/// A repository as listed or created.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Parameters for repository creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewRepository {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub private: bool,
    pub auto_init: bool,
}

/// A single file returned by the contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub sha: String,
    pub size: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// Body of a create-or-update file request.
#[derive(Debug, Clone, Serialize)]
pub struct PutContents {
    pub message: String,
    /// Base64 file content.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentRef {
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Result of a create-or-update file request.
#[derive(Debug, Clone, Deserialize)]
pub struct PutContentsResponse {
    pub content: ContentRef,
    pub commit: CommitRef,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Reference to a repository as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse `owner/name`.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, name) = value.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: Url,
    http: reqwest::Client,
}

impl GitHubClient {
    /// Create a client against `base_url` (e.g. [`DEFAULT_API_URL`]).
    pub fn new(base_url: &str, http: reqwest::Client) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        Ok(Self { base_url, http })
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, credential: &Credential) -> RequestBuilder {
        debug!("GitHub {} {}", method, url.path());
        self.http
            .request(method, url)
            .bearer_auth(credential.access_token.expose())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        response.json::<T>().await.map_err(ApiError::from_transport)
    }

    /// `GET /user`
    pub async fn get_user(&self, credential: &Credential) -> Result<User, ApiError> {
        let url = self.url(["user"]);
        Self::send(self.request(Method::GET, url, credential)).await
    }

    /// `GET /user/repos`, following pages until a short one.
    pub async fn list_repositories(
        &self,
        credential: &Credential,
        visibility: Option<&str>,
    ) -> Result<Vec<Repository>, ApiError> {
        let mut repositories = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut url = self.url(["user", "repos"]);
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("per_page", &PER_PAGE.to_string())
                    .append_pair("page", &page.to_string());
                if let Some(visibility) = visibility {
                    query.append_pair("visibility", visibility);
                }
            }

            let batch: Vec<Repository> =
                Self::send(self.request(Method::GET, url, credential)).await?;
            let done = batch.len() < PER_PAGE;
            repositories.extend(batch);
            if done {
                break;
            }
        }

        debug!("Listed {} repositories", repositories.len());
        Ok(repositories)
    }

    /// `POST /user/repos`, or `POST /orgs/{org}/repos` when `org` is given.
    pub async fn create_repository(
        &self,
        credential: &Credential,
        org: Option<&str>,
        repository: &NewRepository,
    ) -> Result<Repository, ApiError> {
        let url = match org {
            Some(org) => self.url(["orgs", org, "repos"]),
            None => self.url(["user", "repos"]),
        };
        Self::send(self.request(Method::POST, url, credential).json(repository)).await
    }

    /// `GET /repos/{owner}/{repo}/contents/{path}`
    ///
    /// Fails with [`ApiError::Input`] when `path` names a directory.
    pub async fn get_contents(
        &self,
        credential: &Credential,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<FileContent, ApiError> {
        let mut url = self.contents_url(repo, path);
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }

        let value: serde_json::Value =
            Self::send(self.request(Method::GET, url, credential)).await?;
        if value.is_array() {
            return Err(ApiError::input("path", format!("{} is a directory", path)));
        }

        let file: FileContent = serde_json::from_value(value).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })?;
        if file.kind != "file" {
            return Err(ApiError::input(
                "path",
                format!("{} is a {}, not a file", path, file.kind),
            ));
        }
        Ok(file)
    }

    /// Like [`get_contents`](Self::get_contents) but maps 404 to `None`.
    pub async fn find_contents(
        &self,
        credential: &Credential,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<FileContent>, ApiError> {
        match self.get_contents(credential, repo, path, git_ref).await {
            Ok(file) => Ok(Some(file)),
            Err(ApiError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `PUT /repos/{owner}/{repo}/contents/{path}`
    pub async fn put_contents(
        &self,
        credential: &Credential,
        repo: &RepoRef,
        path: &str,
        body: &PutContents,
    ) -> Result<PutContentsResponse, ApiError> {
        let url = self.contents_url(repo, path);
        Self::send(self.request(Method::PUT, url, credential).json(body)).await
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> Url {
        let segments = ["repos", repo.owner.as_str(), repo.name.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        self.url(segments)
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("no response body")
                    .to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}
