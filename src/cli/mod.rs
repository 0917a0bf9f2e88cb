use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod floats;
pub mod init;
pub mod serve;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Initialize the local database
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
        /// Load a small demo fleet of ARGO floats
        #[arg(long, action, default_value = "false")]
        seed: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Chat with the ocean assistant
    Chat {
        /// Continue an existing conversation
        #[arg(long)]
        conversation_id: Option<String>,
    },
    /// List ARGO floats or show one in detail
    Floats {
        #[arg(long)]
        id: Option<String>,
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
        Some(Command::Init { db, seed }) => {
            init::run(db, seed, &config.db_path).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat { conversation_id }) => {
            chat::run(config, conversation_id).await?;
        }
        Some(Command::Floats { id }) => {
            floats::run(id, &config.db_path).await?;
        }
        None => {}
    }

    Ok(())
}
