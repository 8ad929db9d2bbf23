pub mod commands;
pub mod utils;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::PgDatabase;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Assembly Portal administration - RBAC seeding, video import, accounts")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create every role permission and the four role records")]
    InitRbac,

    #[command(about = "Import videos from page-*.json files in a directory")]
    ImportVideos(commands::videos::ImportArgs),

    #[command(about = "Create a user account with a role")]
    CreateUser(commands::users::CreateUserArgs),
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

/// Administrative commands always run against Postgres.
async fn open_database() -> anyhow::Result<PgDatabase> {
    let config = DatabaseConfig::from_env().context("invalid database configuration")?;
    if config.backend != StorageBackend::Postgres {
        bail!("administrative commands need PORTAL_STORAGE=postgres");
    }
    PgDatabase::connect(&config)
        .await
        .context("failed to open database")
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let db = open_database().await?;

    let result = match cli.command {
        Commands::InitRbac => commands::rbac::handle_init(&db, &output_format).await,
        Commands::ImportVideos(args) => commands::videos::handle_import(&db, args, &output_format).await,
        Commands::CreateUser(args) => commands::users::handle_create(&db, args, &output_format).await,
    };

    crate::database::Database::close(&db).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["portal", "init-rbac"]).unwrap();
        assert!(matches!(cli.command, Commands::InitRbac));

        let cli = Cli::try_parse_from(["portal", "--json", "import-videos", "public/data"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::ImportVideos(args) => assert_eq!(args.dir.to_str(), Some("public/data")),
            _ => panic!("expected import-videos"),
        }
    }

    #[test]
    fn create_user_defaults_to_user_role() {
        let cli = Cli::try_parse_from([
            "portal",
            "create-user",
            "--email",
            "clerk@assembly.gov",
            "--password",
            "Secret123",
            "--name",
            "Clerk",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateUser(args) => {
                assert_eq!(args.role, "USER");
                assert_eq!(args.name, "Clerk");
            }
            _ => panic!("expected create-user"),
        }
    }

    #[test]
    fn create_user_requires_email() {
        assert!(Cli::try_parse_from(["portal", "create-user", "--password", "x", "--name", "y"]).is_err());
    }
}
