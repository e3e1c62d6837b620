//! Haat CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! haat migrate
//!
//! # Create the first admin account
//! haat admin create -p 9876543210 --password 'long-passphrase' -n "Ops Admin"
//!
//! # Load starter categories (bundled list, or a YAML file)
//! haat seed categories
//! haat seed categories -f my-categories.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create admin accounts
//! - `seed categories` - Insert categories, skipping names that exist

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "haat")]
#[command(author, version, about = "Haat CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin phone number (10 digits)
        #[arg(short, long)]
        phone: String,

        /// Admin password (at least 8 characters)
        #[arg(long, env = "HAAT_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Admin display name
        #[arg(short, long)]
        name: Option<String>,

        /// Admin email address
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert product categories
    Categories {
        /// YAML file of categories (defaults to the bundled list)
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                phone,
                password,
                name,
                email,
            } => {
                commands::admin::create(phone, password, name, email).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Categories { file } => {
                commands::seed::categories(file.as_deref()).await?;
            }
        },
    }
    Ok(())
}
