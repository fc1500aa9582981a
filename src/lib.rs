pub mod client;
pub mod config;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod pull;
pub mod push;
pub mod transfer;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use client::ApiClient;
use config::{load_config, save_config};
use transfer::{TransferConfig, TransferError, TransferKind, TransportError};

/// CLI to manage base database dumps and files archives for Drupal preview
/// environments.
#[derive(Parser)]
#[clap(
    name = "preview",
    version,
    about = "Push and pull base database dumps and files archives for preview environments"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store the preview server URL and API token
    Setup {
        /// Base URL of the preview server, e.g. https://previews.example.org
        api_url: String,
        /// API token; omit to keep the currently stored one
        #[clap(long)]
        token: Option<String>,
    },
    /// Push base files to the preview server
    Push {
        #[clap(subcommand)]
        target: PushTarget,
    },
    /// Pull files from a preview environment
    Pull {
        #[clap(subcommand)]
        target: PullTarget,
    },
}

#[derive(Subcommand)]
pub enum PushTarget {
    /// Export and upload the base database
    Db {
        /// Upload this existing dump instead of generating one
        file: Option<PathBuf>,
        /// Skip confirmation prompts
        #[clap(short = 'y', long)]
        yes: bool,
    },
    /// Package and upload the base files archive
    Files {
        /// Upload this existing archive instead of packaging
        file: Option<PathBuf>,
        /// Skip confirmation prompts
        #[clap(short = 'y', long)]
        yes: bool,
        /// Exclude files larger than this size, e.g. --strip-heavy-files 10mb
        #[clap(long)]
        strip_heavy_files: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PullTarget {
    /// Download a preview's database dump
    Db {
        /// Preview reference, e.g. drupal-test/mr-5
        preview: String,
        /// Output file path
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a preview's files archive
    Files {
        /// Preview reference, e.g. drupal-test/mr-5
        preview: String,
        /// Output file path
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

/// Async CLI entrypoint, shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Setup { api_url, token } => {
            let mut cfg = load_config();
            cfg.api_url = api_url.trim_end_matches('/').to_string();
            if let Some(token) = token {
                cfg.token = token;
            }
            save_config(&cfg)?;
            eprintln!("Configuration saved to {}", config::config_path().display());
            Ok(())
        }
        Commands::Push { target } => {
            let client = authenticated_client()?;
            let config = TransferConfig::default();
            let result = match target {
                PushTarget::Db { file, yes } => push::push_db(&client, &config, file, yes).await,
                PushTarget::Files {
                    file,
                    yes,
                    strip_heavy_files,
                } => push::push_files(&client, &config, file, yes, strip_heavy_files).await,
            };
            with_auth_guidance(result)
        }
        Commands::Pull { target } => {
            let client = authenticated_client()?;
            let result = match target {
                PullTarget::Db { preview, output } => {
                    pull::pull(&client, &preview, TransferKind::Db, output).await
                }
                PullTarget::Files { preview, output } => {
                    pull::pull(&client, &preview, TransferKind::Files, output).await
                }
            };
            with_auth_guidance(result)
        }
    }
}

fn authenticated_client() -> Result<ApiClient> {
    let cfg = load_config();
    if cfg.api_url.is_empty() {
        bail!("API URL not configured. Run 'preview setup <API_URL> --token <TOKEN>' first.");
    }
    if cfg.token.is_empty() {
        bail!("Not authenticated. Run 'preview setup <API_URL> --token <TOKEN>' first.");
    }
    Ok(ApiClient::new(&cfg.api_url, &cfg.token))
}

/// A rejected token cannot be fixed by retrying, so it gets guidance instead
/// of a bare error chain. The decision to exit non-zero stays in `main`.
fn with_auth_guidance(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if is_auth_failure(&e) => {
            eprintln!("Authentication failed. Your token may be expired or revoked.");
            eprintln!("Re-authenticate by running:\n");
            eprintln!("  preview setup <API_URL> --token <TOKEN>\n");
            Err(e)
        }
        other => other,
    }
}

fn is_auth_failure(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<TransferError>(),
            Some(TransferError::AuthExpired)
        ) || matches!(
            cause.downcast_ref::<TransportError>(),
            Some(TransportError::AuthExpired)
        )
    })
}
