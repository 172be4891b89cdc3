//! Adgate - Active Directory authentication gateway
//!
//! Command-line front end for the directory pool and the authentication
//! orchestrator.

mod commands;
mod utils;

use adgate_core::AdgateConfig;
use clap::{Parser, Subcommand, ValueEnum};
use commands::CommandContext;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "adgate")]
#[command(author = "Adgate Team")]
#[command(version = adgate_core::VERSION)]
#[command(about = "Active Directory authentication gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ADGATE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ADGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate an identifier (username, email or phone)
    Authenticate {
        identifier: String,

        /// Secret; prompted on stdin when omitted
        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Copy the directory email onto the identity
        #[arg(long)]
        populate_email: bool,
    },

    /// Verify directory credentials with a bind/unbind cycle
    Probe {
        username: String,

        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log in to the directory and show the user's own entry
    Whoami {
        username: String,

        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Show every attribute of the entry
        #[arg(long)]
        all: bool,
    },

    /// Paged subtree search as a directory user
    Search {
        username: String,

        /// LDAP filter, e.g. "(objectClass=group)"
        filter: String,

        /// Search root (defaults to BASE_DN)
        #[arg(long)]
        base: Option<String>,

        /// Attributes to print (repeatable; default all)
        #[arg(long = "attr")]
        attrs: Vec<String>,

        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Change a directory user's password
    Passwd {
        username: String,

        /// Current password
        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[arg(long, env = "ADGATE_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },

    /// Decode a userAccountControl value
    Uac { value: String },

    /// Hash a secret for the local users file
    HashPassword {
        #[arg(long, env = "ADGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load config
    let mut config = if let Some(config_path) = &cli.config {
        AdgateConfig::from_file(config_path)?
    } else {
        AdgateConfig::from_env()?
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config.logging.level, &config.logging.format);

    let ctx = CommandContext {
        config,
        output_format: cli.output,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Authenticate {
            identifier,
            password,
            populate_email,
        } => commands::authenticate::execute(&ctx, &identifier, password, populate_email).await,
        Commands::Probe { username, password } => {
            commands::directory::probe(&ctx, &username, password).await
        }
        Commands::Whoami {
            username,
            password,
            all,
        } => commands::directory::whoami(&ctx, &username, password, all).await,
        Commands::Search {
            username,
            filter,
            base,
            attrs,
            password,
        } => {
            commands::directory::search(&ctx, &username, password, &filter, base.as_deref(), &attrs)
                .await
        }
        Commands::Passwd {
            username,
            password,
            new_password,
        } => commands::directory::passwd(&ctx, &username, password, new_password).await,
        Commands::Uac { value } => commands::uac::execute(&ctx, &value),
        Commands::HashPassword { password } => commands::hash::execute(&ctx, password),
        Commands::Version => {
            println!("adgate {}", adgate_core::VERSION);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays parseable
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
