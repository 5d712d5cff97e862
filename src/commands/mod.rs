//! CLI command definitions and dispatch.

pub mod export;
pub mod files;
pub mod migrate;
pub mod store;
pub mod tree;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use treevault_core::config::AppConfig;
use treevault_core::result::AppResult;
use treevault_entity::resource::AccessGroups;

use crate::app::App;
use crate::output::OutputFormat;

/// TreeVault: permissioned directory trees over local disk
#[derive(Debug, Parser)]
#[command(name = "treevault", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/treevault")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Acting user id
    #[arg(short, long, global = true)]
    pub user: Option<Uuid>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Store management
    Store(store::StoreArgs),
    /// Print a subtree, e.g. `tree docs:/reports`
    Tree(tree::TreeArgs),
    /// Create a directory
    Mkdir(files::MkdirArgs),
    /// Copy a local file into a directory
    Put(files::PutArgs),
    /// Copy a file or directory into a directory
    Cp(files::TransferArgs),
    /// Move a file or directory into a directory
    Mv(files::TransferArgs),
    /// Remove a file or directory
    Rm(files::RmArgs),
    /// Rename a file or directory
    Rename(files::RenameArgs),
    /// Write resources into a zip archive
    Export(export::ExportArgs),
}

/// Declared groups given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct GroupArgs {
    /// Group for all three permission kinds
    #[arg(long)]
    pub group: Option<String>,
    /// Read group
    #[arg(long)]
    pub read_group: Option<String>,
    /// Write group
    #[arg(long)]
    pub write_group: Option<String>,
    /// Execute group
    #[arg(long)]
    pub execute_group: Option<String>,
}

impl GroupArgs {
    /// Declared groups; kinds left out are inherited.
    pub fn to_groups(&self) -> AccessGroups {
        let pick = |specific: &Option<String>| specific.clone().or_else(|| self.group.clone());
        AccessGroups {
            read: pick(&self.read_group),
            write: pick(&self.write_group),
            execute: pick(&self.execute_group),
        }
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if let Commands::Migrate = &self.command {
            return migrate::execute(config).await;
        }

        let app = App::start(config).await?;
        let result = match &self.command {
            Commands::Migrate => Ok(()),
            Commands::Store(args) => store::execute(args, &app, self.format).await,
            Commands::Tree(args) => tree::execute(args, &app, self.user, self.format).await,
            Commands::Mkdir(args) => files::mkdir(args, &app, self.user, self.format).await,
            Commands::Put(args) => files::put(args, &app, self.user, self.format).await,
            Commands::Cp(args) => files::copy(args, &app, self.user, self.format).await,
            Commands::Mv(args) => files::move_to(args, &app, self.user, self.format).await,
            Commands::Rm(args) => files::remove(args, &app, self.user).await,
            Commands::Rename(args) => files::rename(args, &app, self.user, self.format).await,
            Commands::Export(args) => export::execute(args, &app, self.user).await,
        };
        app.shutdown().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_group_overrides_shared_one() {
        let args = GroupArgs {
            group: Some("staff".into()),
            write_group: Some("editors".into()),
            ..GroupArgs::default()
        };
        let groups = args.to_groups();
        assert_eq!(groups.read.as_deref(), Some("staff"));
        assert_eq!(groups.write.as_deref(), Some("editors"));
        assert_eq!(groups.execute.as_deref(), Some("staff"));
        assert!(GroupArgs::default().to_groups().is_empty());
    }

    #[test]
    fn test_parses_location_commands() {
        let cli = Cli::try_parse_from([
            "treevault",
            "--format",
            "json",
            "mkdir",
            "docs:/reports",
            "--group",
            "G1",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Mkdir(_)));
    }
}
