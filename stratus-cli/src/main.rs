//! Stratus CLI
//!
//! Command-line front end for the control-plane test client

mod commands;
mod config;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stratus_common::AccountType;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to $STRATUS_CONFIG or ./stratus.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Also write JSON logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the endpoint and privilege tier of the configured credentials
    Whoami,
    /// Ensure a user exists and print its API key pair
    UserKeys {
        /// Account name
        #[arg(short, long)]
        account: String,
        /// Domain name
        #[arg(short, long)]
        domain: String,
        /// Account type (user, admin, domain-admin)
        #[arg(short = 't', long, default_value = "user")]
        account_type: AccountType,
        /// Print the secret key instead of masking it
        #[arg(long)]
        show_secret: bool,
    },
    /// Call an API command
    Call {
        /// Command name, e.g. listDomains
        command: String,
        /// Parameters as key=value
        params: Vec<String>,
        /// Wait for the async job the command starts
        #[arg(long = "async")]
        is_async: bool,
        /// Submit the command this many times
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
        /// Concurrent workers for repeated submissions
        #[arg(short, long)]
        workers: Option<usize>,
        /// Seconds between submissions
        #[arg(short, long, default_value_t = 0.0)]
        interval: f64,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;
    let format = output::OutputFormat::from_str(&cli.output);

    match cli.command {
        Commands::Completions { shell } => {
            generate_completions(shell);
            return Ok(());
        }
        Commands::Whoami => {
            let session = config::connect(cli.config.as_deref()).await?;
            let result = commands::session::whoami(&session, format).await;
            session.close().await;
            result?
        }
        Commands::UserKeys {
            account,
            domain,
            account_type,
            show_secret,
        } => {
            let session = config::connect(cli.config.as_deref()).await?;
            let result = commands::session::user_keys(
                &session,
                &account,
                &domain,
                account_type,
                show_secret,
                format,
            )
            .await;
            session.close().await;
            result?
        }
        Commands::Call {
            command,
            params,
            is_async,
            repeat,
            workers,
            interval,
        } => {
            let session = config::connect(cli.config.as_deref()).await?;
            let request = commands::call::CallRequest {
                command,
                params,
                is_async,
                repeat,
                workers,
                interval,
            };
            let result = commands::call::handle_call(&session, request, format).await;
            session.close().await;
            result?
        }
    }

    Ok(())
}

/// Generate shell completions
fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut io::stdout());
}
