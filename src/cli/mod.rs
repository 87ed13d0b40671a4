use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod history;
pub mod init;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and database schema
    Init {},
    /// Run the dev server for the front end and the history API
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "5000")]
        port: String,
    },
    /// Start an interactive chat session
    Chat {
        /// Sign in as this identity on start
        #[arg(long)]
        user: Option<String>,

        /// Display name for the signed in identity
        #[arg(long)]
        name: Option<String>,
    },
    /// Print saved conversations for an identity
    History {
        #[arg(long)]
        user: String,

        #[arg(long)]
        limit: Option<usize>,

        /// Print records as JSON
        #[arg(long, action, default_value = "false")]
        json: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat { user, name }) => {
            chat::run(config, user, name).await?;
        }
        Some(Command::History { user, limit, json }) => {
            let limit = limit.unwrap_or(config.history_limit);
            history::run(&config, &user, limit, json).await?;
        }
        None => {}
    }

    Ok(())
}
