//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use gitsmith_core::{
    ConnectorClient, ConnectorSettings, Credential, CredentialResolver, Dispatcher, GitHubClient,
    OperationRegistry, TokenProvider, github,
};
use serde_json::{Value, json};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub type TestResolver = CredentialResolver<ConnectorClient>;

/// A credential valid for another hour.
pub fn valid_credential(token: &str) -> Credential {
    Credential::new(token, "refresh-1", Utc::now() + chrono::Duration::hours(1))
}

/// A credential that expired a minute ago.
pub fn expired_credential(token: &str) -> Credential {
    Credential::new(token, "refresh-1", Utc::now() - chrono::Duration::minutes(1))
}

/// Connector client pointed at the mock server.
pub fn connector(server: &MockServer, timeout: Duration) -> ConnectorClient {
    let settings = ConnectorSettings::new("conn-1", "process-secret", &server.uri()).unwrap();
    ConnectorClient::new(settings, github::http_client(timeout).unwrap())
}

/// Dispatcher whose connector and GitHub API both live on `server`.
pub fn dispatcher(
    server: &MockServer,
    seed: Option<Credential>,
) -> (Arc<Dispatcher>, Arc<TestResolver>) {
    dispatcher_with_timeout(server, seed, Duration::from_secs(5))
}

pub fn dispatcher_with_timeout(
    server: &MockServer,
    seed: Option<Credential>,
    timeout: Duration,
) -> (Arc<Dispatcher>, Arc<TestResolver>) {
    let mut resolver = CredentialResolver::new(connector(server, timeout));
    if let Some(credential) = seed {
        resolver = resolver.with_credential(credential);
    }
    let resolver = Arc::new(resolver);
    let tokens: Arc<dyn TokenProvider> = resolver.clone();

    let github = GitHubClient::new(&server.uri(), github::http_client(timeout).unwrap()).unwrap();
    let dispatcher = Dispatcher::new(OperationRegistry::with_defaults(), tokens, github);
    (Arc::new(dispatcher), resolver)
}

/// Number of requests the server saw on `path`.
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}

/// Total number of requests the server saw.
pub async fn total_hits(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// JSON for a repository as GitHub returns it.
pub fn repo_json(owner: &str, name: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "private": false,
        "description": null,
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "default_branch": "main",
        "fork": false
    })
}

/// In-memory stand-in for the contents API of one repository.
///
/// Answers `GET` and `PUT` on `/repos/{owner}/{repo}/contents/...`, wraps
/// base64 content at 60 columns like GitHub does, and enforces the sha
/// check on updates. Clones share state, so one copy can be mounted while
/// the test inspects another.
#[derive(Clone)]
pub struct FakeContents {
    prefix: String,
    files: Arc<Mutex<HashMap<String, (String, String)>>>,
    writes: Arc<AtomicUsize>,
}

impl FakeContents {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            prefix: format!("/repos/{}/{}/contents/", owner, repo),
            files: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pre-populate a file.
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        let sha = format!("seed-{}", path);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (STANDARD.encode(content), sha));
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(encoded, _)| STANDARD.decode(encoded).unwrap())
    }

    pub fn path_regex(&self) -> String {
        format!("^{}.+$", self.prefix)
    }

    fn get(&self, path: &str) -> ResponseTemplate {
        match self.files.lock().unwrap().get(path) {
            Some((encoded, sha)) => {
                let wrapped: Vec<String> = encoded
                    .as_bytes()
                    .chunks(60)
                    .map(|c| String::from_utf8_lossy(c).into_owned())
                    .collect();
                let size = STANDARD.decode(encoded).map(|b| b.len()).unwrap_or(0);
                ResponseTemplate::new(200).set_body_json(json!({
                    "type": "file",
                    "path": path,
                    "sha": sha,
                    "size": size,
                    "content": wrapped.join("\n") + "\n",
                    "encoding": "base64"
                }))
            }
            None => ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})),
        }
    }

    fn put(&self, path: &str, body: &[u8]) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let Some(content) = body["content"].as_str() else {
            return ResponseTemplate::new(422).set_body_json(json!({"message": "content missing"}));
        };

        let mut files = self.files.lock().unwrap();
        let sent_sha = body["sha"].as_str();
        match (files.get(path), sent_sha) {
            (Some((_, current)), Some(sent)) if current != sent => {
                return ResponseTemplate::new(409)
                    .set_body_json(json!({"message": "sha does not match"}));
            }
            (Some(_), None) => {
                return ResponseTemplate::new(422)
                    .set_body_json(json!({"message": "\"sha\" wasn't supplied."}));
            }
            _ => {}
        }

        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let sha = format!("blob-{}", n);
        let created = files
            .insert(path.to_string(), (content.to_string(), sha.clone()))
            .is_none();

        ResponseTemplate::new(if created { 201 } else { 200 }).set_body_json(json!({
            "content": {
                "path": path,
                "sha": sha,
                "html_url": format!("https://github.com/x/y/blob/main/{}", path)
            },
            "commit": { "sha": format!("commit-{}", n) }
        }))
    }
}

impl Respond for FakeContents {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(path) = request.url.path().strip_prefix(&self.prefix) else {
            return ResponseTemplate::new(404);
        };
        match request.method.as_str() {
            "GET" => self.get(path),
            "PUT" => self.put(path, &request.body),
            _ => ResponseTemplate::new(405),
        }
    }
}
