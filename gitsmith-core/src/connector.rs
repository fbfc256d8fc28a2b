//! Identity connector boundary.
//!
//! The resolver never talks HTTP itself; it asks a [`CredentialSource`] for an
//! initial credential and for refreshed ones. Two sources are provided:
//!
//! - [`ConnectorClient`] - the delegated-token connector service
//!   (`GET /connection-metadata`, `POST /refresh`)
//! - [`StaticTokenSource`] - a personal access token taken from the environment
//!
//! The connector's wire format is owned by the provider. Responses are decoded
//! into private wire structs and mapped field by field into [`Credential`], so
//! a change on their side stays contained in this module.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::credential::{Credential, Secret};

/// Environment variable holding the connector identifier.
pub const CONNECTOR_ID_VAR: &str = "GITSMITH_CONNECTOR_ID";

/// Environment variable holding the process-scoped connector secret.
pub const CONNECTOR_SECRET_VAR: &str = "GITSMITH_CONNECTOR_SECRET";

/// Environment variable overriding the connector base URL.
pub const CONNECTOR_URL_VAR: &str = "GITSMITH_CONNECTOR_URL";

/// Environment variable holding a personal access token.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

/// Connector base URL used when none is configured.
pub const DEFAULT_CONNECTOR_URL: &str = "http://localhost:8090";

/// Header carrying the connector secret on metadata requests.
const SECRET_HEADER: &str = "X-Connector-Secret";

/// Longest error body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Error type for credential acquisition.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// A required configuration value is absent.
    #[error("missing configuration: {name} is not set")]
    MissingConfig { name: String },

    /// A configuration value is present but unusable.
    #[error("invalid configuration for {name}: {message}")]
    InvalidConfig { name: String, message: String },

    /// The connector refused the credentials or the refresh token.
    #[error("connector rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The connector answered with a transient failure (5xx or 429).
    #[error("connector unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The connector could not be reached or timed out.
    #[error("network error talking to connector: {message}")]
    Network { message: String },

    /// The connector answered 2xx with a body that does not map to a credential.
    #[error("malformed connector response: {message}")]
    Malformed { message: String },
}

impl AuthError {
    /// Whether re-attempting without re-authentication may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Network { .. })
    }

    fn from_transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::Network { message }
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let message = excerpt(body);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Unavailable {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Source of delegated credentials.
///
/// Implementations must not cache: caching and refresh scheduling are the
/// resolver's job.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Obtain an initial credential.
    async fn fetch(&self) -> Result<Credential, AuthError>;

    /// Exchange the refresh token of `current` for a new credential.
    async fn refresh(&self, current: &Credential) -> Result<Credential, AuthError>;
}

/// Configuration for [`ConnectorClient`].
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Identifier of the connection to fetch tokens for.
    pub connector_id: String,

    /// Process-scoped secret authorizing metadata requests.
    pub secret: Secret,

    /// Base URL of the connector service.
    pub base_url: Url,
}

impl ConnectorSettings {
    /// Build settings from explicit values.
    pub fn new(
        connector_id: impl Into<String>,
        secret: impl Into<String>,
        base_url: &str,
    ) -> Result<Self, AuthError> {
        let base_url = Url::parse(base_url).map_err(|e| AuthError::InvalidConfig {
            name: CONNECTOR_URL_VAR.to_string(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AuthError::InvalidConfig {
                name: CONNECTOR_URL_VAR.to_string(),
                message: format!("{} cannot be used as a base URL", base_url),
            });
        }

        Ok(Self {
            connector_id: connector_id.into(),
            secret: Secret::new(secret),
            base_url,
        })
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through a lookup function.
    ///
    /// Empty values count as absent. `default_url` is used when
    /// [`CONNECTOR_URL_VAR`] is not set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_default(lookup, DEFAULT_CONNECTOR_URL)
    }

    /// Like [`from_lookup`](Self::from_lookup) with an explicit fallback URL.
    pub fn from_lookup_with_default<F>(lookup: F, default_url: &str) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AuthError::MissingConfig {
                    name: name.to_string(),
                })
        };

        let connector_id = required(CONNECTOR_ID_VAR)?;
        let secret = required(CONNECTOR_SECRET_VAR)?;
        let base_url = lookup(CONNECTOR_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_url.to_string());

        Self::new(connector_id, secret, &base_url)
    }
}

/// Token payload as sent by the connector.
#[derive(Debug, Deserialize)]
struct TokenWire {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RefreshRequestWire<'a> {
    refresh_token: &'a str,
}

impl TokenWire {
    /// Map the wire payload onto a [`Credential`].
    ///
    /// `previous_refresh` is kept when the response omits a new refresh token.
    fn into_credential(self, previous_refresh: Option<&Secret>) -> Result<Credential, AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::Malformed {
                message: "empty access_token".to_string(),
            });
        }

        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(seconds)) => Duration::try_seconds(seconds)
                .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                .ok_or_else(|| AuthError::Malformed {
                    message: format!("expires_in of {} seconds is out of range", seconds),
                })?,
            (None, None) => {
                return Err(AuthError::Malformed {
                    message: "response carries neither expires_at nor expires_in".to_string(),
                });
            }
        };

        let refresh_token = match (self.refresh_token, previous_refresh) {
            (Some(token), _) if !token.is_empty() => Secret::new(token),
            (_, Some(previous)) => previous.clone(),
            _ => {
                return Err(AuthError::Malformed {
                    message: "response carries no refresh_token".to_string(),
                });
            }
        };

        Ok(Credential {
            access_token: Secret::new(self.access_token),
            expires_at,
            refresh_token,
        })
    }
}

/// HTTP client for the delegated-token connector service.
pub struct ConnectorClient {
    settings: ConnectorSettings,
    http: reqwest::Client,
}

impl ConnectorClient {
    /// Create a connector client.
    ///
    /// `http` should carry the process-wide request timeout.
    pub fn new(settings: ConnectorSettings, http: reqwest::Client) -> Self {
        Self { settings, http }
    }

    /// The settings this client was built with.
    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    fn endpoint(&self, segment: &str) -> Result<Url, AuthError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::InvalidConfig {
                name: CONNECTOR_URL_VAR.to_string(),
                message: "connector URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn decode(response: reqwest::Response) -> Result<TokenWire, AuthError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status, &body));
        }

        response.json::<TokenWire>().await.map_err(|e| {
            if e.is_decode() {
                AuthError::Malformed {
                    message: e.to_string(),
                }
            } else {
                AuthError::from_transport(e)
            }
        })
    }
}

#[async_trait]
impl CredentialSource for ConnectorClient {
    async fn fetch(&self) -> Result<Credential, AuthError> {
        let mut url = self.endpoint("connection-metadata")?;
        url.query_pairs_mut()
            .append_pair("connector", &self.settings.connector_id);

        debug!(
            "Fetching connection metadata for connector {}",
            self.settings.connector_id
        );

        let response = self
            .http
            .get(url)
            .header(SECRET_HEADER, self.settings.secret.expose())
            .send()
            .await
            .map_err(AuthError::from_transport)?;

        let credential = Self::decode(response).await?.into_credential(None)?;
        debug!(
            "Connector issued a token expiring at {}",
            credential.expires_at
        );
        Ok(credential)
    }

    async fn refresh(&self, current: &Credential) -> Result<Credential, AuthError> {
        let url = self.endpoint("refresh")?;

        debug!(
            "Refreshing token for connector {}",
            self.settings.connector_id
        );

        let response = self
            .http
            .post(url)
            .json(&RefreshRequestWire {
                refresh_token: current.refresh_token.expose(),
            })
            .send()
            .await
            .map_err(AuthError::from_transport)?;

        match Self::decode(response).await {
            Ok(wire) => wire.into_credential(Some(&current.refresh_token)),
            Err(e) => {
                warn!("Connector refresh failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Credential source backed by a personal access token.
///
/// The token itself does not expire locally; each fetch issues it with a
/// fixed nominal lifetime so the resolver's refresh cycle still applies.
pub struct StaticTokenSource {
    token: Secret,
    lifetime: Duration,
}

impl StaticTokenSource {
    /// Create a source handing out `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token),
            lifetime: Duration::hours(1),
        }
    }

    /// Override the nominal lifetime of issued credentials.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Read the token from [`GITHUB_TOKEN_VAR`].
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the token through a lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(GITHUB_TOKEN_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| AuthError::MissingConfig {
                name: GITHUB_TOKEN_VAR.to_string(),
            })
    }

    fn issue(&self) -> Credential {
        Credential {
            access_token: self.token.clone(),
            expires_at: Utc::now() + self.lifetime,
            refresh_token: self.token.clone(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticTokenSource {
    async fn fetch(&self) -> Result<Credential, AuthError> {
        Ok(self.issue())
    }

    async fn refresh(&self, _current: &Credential) -> Result<Credential, AuthError> {
        Ok(self.issue())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_settings_require_connector_id() {
        let err = ConnectorSettings::from_lookup(lookup_from(&[(CONNECTOR_SECRET_VAR, "s")]))
            .unwrap_err();
        match err {
            AuthError::MissingConfig { name } => assert_eq!(name, CONNECTOR_ID_VAR),
            other => panic!("Expected MissingConfig, got {:?}", other),
        }
        assert!(!ConnectorSettings::from_lookup(lookup_from(&[])).unwrap_err().is_retryable());
    }

    #[test]
    fn test_settings_treat_blank_secret_as_missing() {
        let err = ConnectorSettings::from_lookup(lookup_from(&[
            (CONNECTOR_ID_VAR, "conn-1"),
            (CONNECTOR_SECRET_VAR, "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingConfig { name } if name == CONNECTOR_SECRET_VAR));
    }

    #[test]
    fn test_settings_default_and_override_url() {
        let settings = ConnectorSettings::from_lookup(lookup_from(&[
            (CONNECTOR_ID_VAR, "conn-1"),
            (CONNECTOR_SECRET_VAR, "s3cr3t"),
        ]))
        .unwrap();
        assert_eq!(settings.connector_id, "conn-1");
        assert_eq!(settings.base_url.as_str(), "http://localhost:8090/");

        let settings = ConnectorSettings::from_lookup(lookup_from(&[
            (CONNECTOR_ID_VAR, "conn-1"),
            (CONNECTOR_SECRET_VAR, "s3cr3t"),
            (CONNECTOR_URL_VAR, "https://connectors.example.com/v2"),
        ]))
        .unwrap();
        assert_eq!(settings.base_url.host_str(), Some("connectors.example.com"));
    }

    #[test]
    fn test_settings_reject_bad_url() {
        let err = ConnectorSettings::new("id", "secret", "not a url").unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig { .. }));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let settings =
            ConnectorSettings::new("id", "secret", "https://connectors.example.com/v2/").unwrap();
        let client = ConnectorClient::new(settings, reqwest::Client::new());
        assert_eq!(
            client.endpoint("refresh").unwrap().as_str(),
            "https://connectors.example.com/v2/refresh"
        );
    }

    #[test]
    fn test_wire_mapping_prefers_expires_at() {
        let at = Utc::now() + Duration::hours(2);
        let wire = TokenWire {
            access_token: "tok".to_string(),
            refresh_token: Some("ref".to_string()),
            expires_at: Some(at),
            expires_in: Some(10),
        };
        let credential = wire.into_credential(None).unwrap();
        assert_eq!(credential.expires_at, at);
        assert_eq!(credential.refresh_token.expose(), "ref");
    }

    #[test]
    fn test_wire_mapping_rejects_out_of_range_lifetime() {
        for seconds in [i64::MAX, i64::MIN] {
            let wire = TokenWire {
                access_token: "tok".to_string(),
                refresh_token: Some("ref".to_string()),
                expires_at: None,
                expires_in: Some(seconds),
            };
            let err = wire.into_credential(None).unwrap_err();
            assert!(matches!(err, AuthError::Malformed { .. }), "expires_in {}", seconds);
        }
    }

    #[test]
    fn test_wire_mapping_keeps_previous_refresh_token() {
        let wire = TokenWire {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            expires_in: Some(3600),
        };
        let previous = Secret::new("old-refresh");
        let credential = wire.into_credential(Some(&previous)).unwrap();
        assert_eq!(credential.refresh_token.expose(), "old-refresh");
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_wire_mapping_requires_expiry() {
        let wire = TokenWire {
            access_token: "tok".to_string(),
            refresh_token: Some("ref".to_string()),
            expires_at: None,
            expires_in: None,
        };
        let err = wire.into_credential(None).unwrap_err();
        assert!(matches!(err, AuthError::Malformed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(AuthError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(AuthError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!AuthError::from_status(StatusCode::UNAUTHORIZED, "bad token").is_retryable());
        assert!(!AuthError::from_status(StatusCode::BAD_REQUEST, "").is_retryable());
    }

    #[test]
    fn test_static_source_requires_token() {
        assert!(StaticTokenSource::from_lookup(lookup_from(&[])).is_err());
        assert!(StaticTokenSource::from_lookup(lookup_from(&[(GITHUB_TOKEN_VAR, "ghp_x")])).is_ok());
    }

    #[tokio::test]
    async fn test_static_source_issues_fresh_credentials() {
        let source = StaticTokenSource::new("ghp_x").with_lifetime(Duration::minutes(10));
        let credential = source.fetch().await.unwrap();
        assert_eq!(credential.access_token.expose(), "ghp_x");
        assert!(!credential.expires_within(Duration::minutes(5)));

        let refreshed = source.refresh(&credential).await.unwrap();
        assert!(refreshed.expires_at >= credential.expires_at);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert!(short.len() < 210);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("  "), "no response body");
    }
}
