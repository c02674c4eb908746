//! Microsoft Graph directory CLI
//!
//! Single-binary client that:
//! 1. Loads a connection profile (headless or web) from TOML
//! 2. Acquires credentials (client credentials, or browser consent)
//! 3. Runs one directory command against Graph and prints the result

mod config;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use graph_auth::{Authority, Connection, Headless, Web, consent_url};
use graph_client::GraphClient;
use graph_client::users::DEFAULT_FIELDS;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConnectionKind};

/// Microsoft Graph directory client
#[derive(Parser, Debug)]
#[command(name = "graph-cli", version, about = "Microsoft Graph directory client", long_about = None)]
struct Cli {
    /// Config file path (falls back to CONFIG_PATH, then graph-cli.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Acquire a token and print it
    Token,
    /// Directory users
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Print the tenant-wide admin consent URL
    ConsentUrl {
        /// Where the consent page sends the administrator afterwards
        #[arg(long)]
        redirect_uri: Option<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum UsersCommand {
    /// List every user in the directory
    List {
        /// Fields to return, comma separated
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
    /// Show one user by object id or principal name
    Get {
        id: String,
        /// Fields to return, comma separated
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },
}

fn authority(config: &Config) -> Authority {
    Authority::new(config.connection.tenant.clone().unwrap_or_default())
        .with_base_url(config.endpoints.authority_url.clone())
}

/// Build the configured connection. Nothing is fetched yet.
fn build_connection(config: &Config, client: reqwest::Client) -> Result<Arc<dyn Connection>> {
    let secret = config
        .connection
        .application_secret
        .clone()
        .filter(|s| !s.is_empty())
        .with_context(|| {
            format!(
                "application secret missing: set {} or application_secret_file",
                config::SECRET_ENV
            )
        })?;
    let scopes = config.scopes()?;
    let application_id = config.connection.application_id.clone();

    let connection: Arc<dyn Connection> = match config.connection.kind {
        ConnectionKind::Headless => Arc::new(
            Headless::new(application_id, secret, scopes)
                .with_authority(authority(config))
                .with_http_client(client),
        ),
        ConnectionKind::Web => {
            let redirect_port = config
                .connection
                .redirect_port
                .context("redirect_port is required for web connections")?;
            Arc::new(
                Web::new(application_id, secret, redirect_port, scopes)
                    .with_authority(authority(config))
                    .with_http_client(client)
                    .with_authorization_timeout(Duration::from_secs(
                        config.endpoints.authorization_timeout_secs,
                    )),
            )
        }
    };
    Ok(connection)
}

fn fields(select: &[String]) -> Vec<&str> {
    let fields: Vec<&str> = select
        .iter()
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .collect();
    if fields.is_empty() {
        DEFAULT_FIELDS.to_vec()
    } else {
        fields
    }
}

async fn run(config: &Config, command: Command) -> Result<()> {
    if let Command::ConsentUrl { redirect_uri } = &command {
        let url = consent_url(
            &authority(config),
            &config.connection.application_id,
            redirect_uri.as_deref(),
            None,
        )?;
        println!("{url}");
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.endpoints.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let connection = build_connection(config, client)?;

    connection
        .initialize_credentials()
        .await
        .context("failed to initialize credentials")?;
    info!(connection = connection.id(), "credentials initialized");

    let graph = GraphClient::new(connection.clone()).with_base_url(config.endpoints.graph_url.clone());

    match command {
        Command::Token => {
            let credential = connection.refresh_credentials().await?;
            info!(
                expires_in_secs = credential.remaining().as_secs(),
                "token acquired"
            );
            println!("{}", credential.access_token());
        }
        Command::Users {
            command: UsersCommand::List { select },
        } => {
            let users = graph.list_users(&fields(&select)).await?;
            info!(count = users.len(), "users listed");
            for user in users {
                println!("{}", user.short_line());
            }
        }
        Command::Users {
            command: UsersCommand::Get { id, select },
        } => {
            let user = graph.get_user(&id, &fields(&select)).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::ConsentUrl { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr so stdout carries only command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        kind = ?config.connection.kind,
        application_id = %config.connection.application_id,
        tenant = config.connection.tenant.as_deref().unwrap_or("common"),
        scopes = config.connection.scopes.len(),
        "configuration loaded"
    );

    tokio::select! {
        result = run(&config, cli.command) => {
            if let Err(ref e) = result {
                error!(error = %e, "command failed");
            }
            result
        }
        _ = shutdown_signal() => {
            warn!("interrupted, abandoning in-flight requests");
            bail!("interrupted")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
