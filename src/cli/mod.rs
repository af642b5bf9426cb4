pub mod commands;
pub mod config;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::session::FileSessionStore;

#[derive(Parser)]
#[command(name = "projectdesk")]
#[command(about = "ProjectDesk CLI - session handoff, route guard checks and chat relay")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "PROJECTDESK_API_URL", help = "Backend base URL")]
    pub api: Option<String>,

    #[arg(long, global = true, env = "PROJECTDESK_SESSION_FILE", help = "Session file (defaults to the CLI config directory)")]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Login, logout and credential handoff")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Evaluate the route guard against the stored session")]
    Guard {
        #[command(subcommand)]
        cmd: commands::guard::GuardCommands,
    },

    #[command(about = "Send a message through the chat relay")]
    Chat {
        #[arg(help = "Message text")]
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs: where the session lives and how to reach the API.
pub struct CliContext {
    pub format: OutputFormat,
    pub store: Arc<FileSessionStore>,
    pub api: ApiClient,
}

impl CliContext {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let session_path = match &cli.session {
            Some(path) => path.clone(),
            None => config::session_path()?,
        };
        let api_url = cli
            .api
            .clone()
            .unwrap_or_else(|| crate::config::config().guard.api_base_url.clone());

        Ok(Self {
            format: OutputFormat::from_cli(cli),
            store: Arc::new(FileSessionStore::new(session_path)),
            api: ApiClient::new(api_url),
        })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = CliContext::from_cli(&cli)?;

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &ctx).await,
        Commands::Guard { cmd } => commands::guard::handle(cmd, &ctx).await,
        Commands::Chat { message } => commands::chat::handle(&message, &ctx).await,
    }
}
