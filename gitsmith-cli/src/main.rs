//! gitsmith CLI
//!
//! Command-line front-end for managing GitHub repositories through delegated
//! connector tokens.
//!
//! # Usage
//!
//! ```bash
//! # Show the connected account and its repositories
//! gitsmith list
//!
//! # Create a private repository
//! gitsmith create-repo my-project --description "Scratch space"
//!
//! # Upload the current directory into a new repository
//! gitsmith create-and-sync my-project --public
//!
//! # Run any registered operation with JSON arguments
//! gitsmith exec get_file --args '{"repository": "octo/demo", "path": "README.md"}'
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitsmith_core::{
    Arguments, ConnectorClient, ConnectorSettings, Dispatcher, OperationRegistry,
    OperationRequest, OperationResult, StaticTokenSource,
};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod config;
mod render;

use config::{AuthMode, CliConfig};

#[derive(Parser)]
#[command(name = "gitsmith")]
#[command(about = "GitHub repository management through delegated credentials")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: platform config dir/gitsmith.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print raw JSON results
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the connected account and list its repositories
    List,

    /// Create a new repository
    CreateRepo {
        /// Repository name
        name: String,

        /// Repository description
        #[arg(short, long)]
        description: Option<String>,

        /// Make the repository public (private by default)
        #[arg(long)]
        public: bool,

        /// Create under an organization instead of the user
        #[arg(long)]
        org: Option<String>,
    },

    /// Upload a local directory into an existing repository
    Sync {
        /// Repository as owner/name
        repository: String,

        /// Local directory to upload
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Target branch
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Commit message used for every file
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Create a repository and upload a local directory into it
    CreateAndSync {
        /// Repository name
        name: String,

        /// Repository description
        #[arg(short, long)]
        description: Option<String>,

        /// Make the repository public (private by default)
        #[arg(long)]
        public: bool,

        /// Create under an organization instead of the user
        #[arg(long)]
        org: Option<String>,

        /// Local directory to upload
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Print a file from a repository
    GetFile {
        /// Repository as owner/name
        repository: String,

        /// File path inside the repository
        path: String,

        /// Branch, tag or commit
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },

    /// Run any registered operation and print its result as JSON
    Exec {
        /// Operation name (see `gitsmith operations`)
        operation: String,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Describe the registered operations as JSON
    Operations,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.log_level);

    if let Some(path) = &config.config_path {
        debug!("Loaded configuration from {:?}", path);
    }

    let json = cli.json;

    match cli.command {
        Commands::Operations => describe_operations(),
        Commands::List => list(&connect(&config)?, json).await,
        Commands::CreateRepo {
            name,
            description,
            public,
            org,
        } => {
            let request = creation_request("create_repository", name, description, public, org);
            run(&connect(&config)?, request, json, render::created).await
        }
        Commands::Sync {
            repository,
            path,
            branch,
            message,
        } => {
            let mut request = OperationRequest::new("sync_project")
                .with_arg("repository", repository)
                .with_arg("source", path.to_string_lossy().into_owned())
                .with_arg("branch", branch);
            if let Some(message) = message {
                request = request.with_arg("message", message);
            }
            run(&connect(&config)?, request, json, render::synced).await
        }
        Commands::CreateAndSync {
            name,
            description,
            public,
            org,
            path,
        } => {
            let request =
                creation_request("create_repository_and_sync", name, description, public, org)
                    .with_arg("source", path.to_string_lossy().into_owned());
            run(&connect(&config)?, request, json, render::created_and_synced).await
        }
        Commands::GetFile {
            repository,
            path,
            git_ref,
        } => {
            let mut request = OperationRequest::new("get_file")
                .with_arg("repository", repository)
                .with_arg("path", path);
            if let Some(git_ref) = git_ref {
                request = request.with_arg("ref", git_ref);
            }
            run(&connect(&config)?, request, json, render::file).await
        }
        Commands::Exec { operation, args } => {
            exec(&connect(&config)?, operation, args.as_deref()).await
        }
    }
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the dispatcher for the configured credential source.
fn connect(config: &CliConfig) -> Result<Dispatcher> {
    let options = config.client_options();

    let dispatcher = match config.auth {
        AuthMode::Connector => {
            let settings = ConnectorSettings::from_lookup_with_default(
                |name| std::env::var(name).ok(),
                &config.connector_url,
            )
            .context("Connector configuration is incomplete")?;
            info!(
                "Using connector {} at {}",
                settings.connector_id, settings.base_url
            );
            Dispatcher::connect(&options, |http| ConnectorClient::new(settings, http))?
        }
        AuthMode::Token => {
            let source = StaticTokenSource::from_env()
                .context("Token authentication needs a personal access token")?;
            info!("Using personal access token");
            Dispatcher::connect(&options, |_| source)?
        }
    };

    debug!("Dispatcher ready: {:?}", dispatcher);
    Ok(dispatcher)
}

fn creation_request(
    operation: &str,
    name: String,
    description: Option<String>,
    public: bool,
    org: Option<String>,
) -> OperationRequest {
    let mut request = OperationRequest::new(operation)
        .with_arg("name", name)
        .with_arg("visibility", if public { "public" } else { "private" });
    if let Some(description) = description {
        request = request.with_arg("description", description);
    }
    if let Some(org) = org {
        request = request.with_arg("org", org);
    }
    request
}

/// Print a failure and turn it into the process exit code.
fn report_failure(result: &OperationResult) -> ExitCode {
    if let Some(failure) = result.as_failure() {
        eprintln!("✗ Error: {}", failure);
        if failure.retryable {
            eprintln!("  This may succeed if you try again.");
        }
    }
    ExitCode::FAILURE
}

async fn run(
    dispatcher: &Dispatcher,
    request: OperationRequest,
    json: bool,
    show: fn(&Value),
) -> Result<ExitCode> {
    let result = dispatcher.execute_with_reauth(request).await;
    let Some(payload) = result.payload() else {
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        return Ok(report_failure(&result));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(payload)?);
    } else {
        show(payload);
    }
    Ok(ExitCode::SUCCESS)
}

async fn list(dispatcher: &Dispatcher, json: bool) -> Result<ExitCode> {
    let user = dispatcher
        .execute_with_reauth(OperationRequest::new("get_user"))
        .await;
    let Some(user) = user.payload() else {
        return Ok(report_failure(&user));
    };

    let repositories = dispatcher
        .execute_with_reauth(OperationRequest::new("list_repositories"))
        .await;
    let Some(repositories) = repositories.payload() else {
        return Ok(report_failure(&repositories));
    };

    if json {
        let combined = serde_json::json!({ "user": user, "repositories": repositories });
        println!("{}", serde_json::to_string_pretty(&combined)?);
    } else {
        render::user_and_repositories(user, repositories);
    }
    Ok(ExitCode::SUCCESS)
}

/// The operation catalogue needs no credentials.
fn describe_operations() -> Result<ExitCode> {
    let catalogue = OperationRegistry::with_defaults().describe();
    println!("{}", serde_json::to_string_pretty(&catalogue)?);
    Ok(ExitCode::SUCCESS)
}

/// Run an arbitrary operation; the result is always printed as JSON.
async fn exec(dispatcher: &Dispatcher, operation: String, args: Option<&str>) -> Result<ExitCode> {
    let arguments: Arguments = match args {
        Some(raw) => serde_json::from_str(raw).context("--args must be a JSON object")?,
        None => Arguments::new(),
    };

    let result = dispatcher
        .execute_with_reauth(OperationRequest::new(operation).with_arguments(arguments))
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
