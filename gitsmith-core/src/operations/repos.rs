//! Repository listing and creation.

use async_trait::async_trait;
use serde_json::Value;

use super::{repository_summary, validate_choice, validate_repo_name};
use crate::credential::Credential;
use crate::github::{ApiError, GitHubClient, NewRepository};
use crate::operation::Operation;
use crate::schema::{Arguments, ArgumentsExt, FieldSpec, FieldType, InputSchema, InvalidArgument};

const LIST_VISIBILITIES: &[&str] = &["all", "public", "private"];
const CREATE_VISIBILITIES: &[&str] = &["public", "private"];

/// `list_repositories`: every repository the user can access, in API order.
pub struct ListRepositories {
    schema: InputSchema,
}

impl ListRepositories {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::new(vec![FieldSpec::optional(
                "visibility",
                FieldType::String,
                "Filter by visibility: all, public or private",
            )]),
        }
    }
}

impl Default for ListRepositories {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for ListRepositories {
    fn name(&self) -> &'static str {
        "list_repositories"
    }

    fn description(&self) -> &'static str {
        "List the repositories of the authenticated user"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        validate_choice(args, "visibility", LIST_VISIBILITIES)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        let repositories = github
            .list_repositories(credential, args.get_str("visibility"))
            .await?;
        Ok(Value::Array(
            repositories.iter().map(repository_summary).collect(),
        ))
    }
}

/// Arguments shared by the operations that create a repository.
pub(crate) fn creation_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::required("name", FieldType::String, "Repository name"),
        FieldSpec::optional("description", FieldType::String, "Short description"),
        FieldSpec::optional(
            "visibility",
            FieldType::String,
            "public or private (default private)",
        ),
        FieldSpec::optional(
            "org",
            FieldType::String,
            "Create under this organization instead of the user",
        ),
    ]
}

pub(crate) fn validate_creation(args: &Arguments) -> Result<(), InvalidArgument> {
    validate_repo_name("name", args.require_str("name")?)?;
    validate_choice(args, "visibility", CREATE_VISIBILITIES)
}

pub(crate) fn new_repository(args: &Arguments, auto_init: bool) -> Result<NewRepository, ApiError> {
    Ok(NewRepository {
        name: args.require_str("name")?.to_string(),
        description: args.get_str("description").map(str::to_string),
        private: args.get_str("visibility").unwrap_or("private") == "private",
        auto_init,
    })
}

/// `create_repository`
pub struct CreateRepository {
    schema: InputSchema,
}

impl CreateRepository {
    pub fn new() -> Self {
        let mut fields = creation_fields();
        fields.push(FieldSpec::optional(
            "auto_init",
            FieldType::Boolean,
            "Create an initial commit with a README",
        ));
        Self {
            schema: InputSchema::new(fields),
        }
    }
}

impl Default for CreateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for CreateRepository {
    fn name(&self) -> &'static str {
        "create_repository"
    }

    fn description(&self) -> &'static str {
        "Create a new repository for the user or an organization"
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn validate(&self, args: &Arguments) -> Result<(), InvalidArgument> {
        self.schema.validate(args)?;
        validate_creation(args)
    }

    async fn execute(
        &self,
        github: &GitHubClient,
        credential: &Credential,
        args: &Arguments,
    ) -> Result<Value, ApiError> {
        let request = new_repository(args, args.get_bool("auto_init").unwrap_or(false))?;
        let created = github
            .create_repository(credential, args.get_str("org"), &request)
            .await?;
        tracing::info!("Created repository {}", created.full_name);
        Ok(repository_summary(&created))
    }
}
