//! `get_user`: the identity behind the current token.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::credential::Credential;
use crate::github::{ApiError, GitHubClient};
use crate::operation::Operation;
use crate::schema::{Arguments, InputSchema};

pub struct GetUser {
    schema: InputSchema,
}

impl GetUser {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::empty(),
        }
    }
}

impl Default for GetUser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for GetUser {
    fn name(&self) -> &'static str {
        "get_user"
    }

    fn description(&self) -> &'static str {
        "Show the GitHub account the current token belongs to"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        _args: &Arguments,
    ) -> Result<Value, ApiError> {
        let user = github.get_user(credential).await?;
        Ok(json!({
            "login": user.login,
            "name": user.name,
            "html_url": user.html_url,
            "public_repos": user.public_repos,
        }))
    }
}
