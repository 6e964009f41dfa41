use anyhow::Result;
use clap::{Parser, Subcommand};
use devai_infrastructure::DevaiPaths;
use std::path::PathBuf;

mod commands;
mod context;
mod logging;
mod render;

use context::{AppContext, Credentials};

#[derive(Parser)]
#[command(name = "devai")]
#[command(about = "Dev AI - chat with a webhook assistant, conversations synced to a store", long_about = None)]
struct Cli {
    /// Mirror logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Use this directory instead of the platform config directory
    #[arg(long, global = true, env = "DEVAI_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Credentials for the default chat command
    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat (default)
    Chat {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Create an account in the session store
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// List stored conversations
    Sessions {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Render a text file (or stdin) as an answer would be shown
    Format {
        file: Option<PathBuf>,
    },
    /// Push locally cached conversations to the store
    Sync {
        #[command(flatten)]
        credentials: Credentials,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = DevaiPaths::new(cli.config_dir.clone());
    let _log_guard = logging::init(paths.logs_dir().ok().as_deref(), cli.verbose);

    let command = cli.command.unwrap_or(Commands::Chat {
        credentials: cli.credentials,
    });
    if let Commands::Format { file } = &command {
        return commands::format::run(file.as_deref());
    }

    let ctx = AppContext::load(paths)?;
    match command {
        Commands::Chat { credentials } => commands::chat::run(&ctx, &credentials).await?,
        Commands::Register {
            username,
            email,
            password,
        } => commands::register::run(&ctx, &username, &email, &password).await?,
        Commands::Sessions { credentials } => commands::sessions::run(&ctx, &credentials).await?,
        Commands::Sync { credentials } => commands::sync::run(&ctx, &credentials).await?,
        Commands::Format { .. } => {}
    }

    Ok(())
}
