//! OAuth 2 document store management binary.
//!
//! Bootstraps the client and token indexes, runs the expired token reaper as a
//! long-lived process, and inspects or revokes individual records.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use oauth2_es::{
    config::Config,
    oauth::types::OAuthClient,
    storage::{
        ClientStore, DocumentClientStore, DocumentStore, DocumentTokenStore, TokenStore,
        create_document_store, parse_storage_backend,
    },
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "oauth2-es",
    about = "OAuth 2 client and token storage on Elasticsearch",
    long_about = "Manages OAuth 2 client registrations and token records stored in an \
                  Elasticsearch-compatible document store. Connection settings and index \
                  names are read from the environment.",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Create the client and token indexes when missing
    Init,
    /// Run the expired token reaper until interrupted
    Reap,
    /// Remove expired token records once and exit
    Sweep,
    /// Manage client registrations
    #[command(subcommand)]
    Client(ClientCommands),
    /// Inspect or revoke token records
    #[command(subcommand)]
    Token(TokenCommands),
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Register or replace a client
    Create(CreateClientArgs),
    /// Show a client by id
    Get {
        #[arg(long, help = "Client identifier")]
        id: String,
    },
}

#[derive(Args)]
struct CreateClientArgs {
    #[arg(long, help = "Client identifier")]
    id: String,

    #[arg(long, help = "Client secret")]
    secret: String,

    #[arg(long, help = "Redirect domain registered for the client")]
    domain: String,

    #[arg(long, help = "Owning user identifier")]
    user_id: Option<String>,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Show the record holding a key
    Get(TokenKey),
    /// Delete every record holding a key
    Revoke(TokenKey),
}

/// Exactly one lookup key
#[derive(Args)]
#[group(required = true, multiple = false)]
struct TokenKey {
    #[arg(long, help = "Authorization code")]
    code: Option<String>,

    #[arg(long, help = "Access token")]
    access: Option<String>,

    #[arg(long, help = "Refresh token")]
    refresh: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "oauth2_es=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let cli = Cli::parse();
    let config = Config::new()?;
    tracing::debug!(version = %config.version, backend = %config.storage_backend, "starting");

    let http_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;

    let backend = parse_storage_backend(
        &config.storage_backend,
        config.elasticsearch_url.as_deref(),
        config.elasticsearch_user.clone(),
        config.elasticsearch_password.clone(),
    )?;
    let store = create_document_store(backend, http_client);

    match cli.command {
        Commands::Init => init(store, &config).await,
        Commands::Reap => reap(store, &config).await,
        Commands::Sweep => sweep(store, &config).await,
        Commands::Client(command) => client(store, &config, command).await,
        Commands::Token(command) => token(store, &config, command).await,
    }
}

async fn init(store: Arc<dyn DocumentStore>, config: &Config) -> Result<()> {
    let clients = DocumentClientStore::open(store.clone(), config.client_store_options()).await?;
    let tokens =
        DocumentTokenStore::open(store, config.token_store_options().with_gc_disabled()).await?;
    println!("client index: {}", clients.index());
    println!("token index: {}", tokens.index());
    Ok(())
}

async fn sweep(store: Arc<dyn DocumentStore>, config: &Config) -> Result<()> {
    let tokens =
        DocumentTokenStore::open(store, config.token_store_options().with_gc_disabled()).await?;
    let deleted = tokens.sweep().await?;
    println!("removed {deleted} expired token records from {}", tokens.index());
    Ok(())
}

async fn reap(store: Arc<dyn DocumentStore>, config: &Config) -> Result<()> {
    let options = config.token_store_options();
    if options.gc_disabled {
        anyhow::bail!("TOKEN_GC_DISABLED is set; refusing to start the reaper");
    }

    let tokens = DocumentTokenStore::open(store, options).await?;

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!(error = ?err, "failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut terminate) => {
                    terminate.recv().await;
                }
                Err(err) => {
                    tracing::error!(error = ?err, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tracker.spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            inner_token.cancel();
        });
        tracker.close();
    }

    token.cancelled().await;
    tokens.close()?;
    tracker.wait().await;

    tracing::info!("reaper shutdown complete");
    Ok(())
}

async fn client(
    store: Arc<dyn DocumentStore>,
    config: &Config,
    command: ClientCommands,
) -> Result<()> {
    let clients = DocumentClientStore::open(store, config.client_store_options()).await?;

    match command {
        ClientCommands::Create(args) => {
            let mut client = OAuthClient::new(args.id, args.secret, args.domain);
            client.user_id = args.user_id;
            clients.create(&client).await?;
            println!("stored client {}", client.id);
        }
        ClientCommands::Get { id } => match clients.get_by_id(&id).await? {
            Some(client) => println!("{}", serde_json::to_string_pretty(&client)?),
            None => eprintln!("no client registered with id {id}"),
        },
    }
    Ok(())
}

async fn token(
    store: Arc<dyn DocumentStore>,
    config: &Config,
    command: TokenCommands,
) -> Result<()> {
    let tokens =
        DocumentTokenStore::open(store, config.token_store_options().with_gc_disabled()).await?;

    match command {
        TokenCommands::Get(key) => {
            let found = match (&key.code, &key.access, &key.refresh) {
                (Some(code), _, _) => tokens.get_by_code(code).await?,
                (_, Some(access), _) => tokens.get_by_access(access).await?,
                (_, _, Some(refresh)) => tokens.get_by_refresh(refresh).await?,
                (None, None, None) => None,
            };
            match found {
                Some(token) => println!("{}", serde_json::to_string_pretty(&token)?),
                None => eprintln!("no token record found"),
            }
        }
        TokenCommands::Revoke(key) => {
            if let Some(code) = &key.code {
                tokens.remove_by_code(code).await?;
            } else if let Some(access) = &key.access {
                tokens.remove_by_access(access).await?;
            } else if let Some(refresh) = &key.refresh {
                tokens.remove_by_refresh(refresh).await?;
            }
            println!("revoked");
        }
    }
    Ok(())
}
