use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hente", about = "Daycare pickup client: session and conversations")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the reconciled session state
    Status,
    /// Store a local session for this device
    Login {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        /// Session lifetime in seconds (default: no expiry)
        #[arg(long)]
        expires_in: Option<u64>,
    },
    /// Rotate the stored session token
    Refresh {
        /// New session lifetime in seconds (default: keep the current expiry)
        #[arg(long)]
        expires_in: Option<u64>,
    },
    /// Sign out and clear the local session
    Logout,
    /// List conversations for the signed-in user
    Conversations {
        /// Message log to read (default: `[messages] path` from config)
        #[arg(long)]
        messages: Option<PathBuf>,
    },
    /// Show one conversation and mark it as read
    Read {
        #[arg(long)]
        partner: String,
        #[arg(long)]
        messages: Option<PathBuf>,
    },
    /// Send a message to a conversation partner
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        messages: Option<PathBuf>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Status)
    }
}
