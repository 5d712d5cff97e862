//! Store management commands.

use clap::{Args, Subcommand};

use treevault_core::result::AppResult;
use treevault_entity::store::AccessRule;
use treevault_service::CreateStoreRequest;

use super::GroupArgs;
use crate::app::App;
use crate::output::{self, OutputFormat, StoreRow};

/// Store arguments.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Store subcommand
    #[command(subcommand)]
    pub command: StoreCommands,
}

/// Store subcommands.
#[derive(Debug, Subcommand)]
pub enum StoreCommands {
    /// Create a store
    Create {
        /// Store name
        name: String,
        /// Disk root, defaults to `<data_root>/<name>`
        #[arg(long)]
        path: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Rule for undeclared permission kinds: allow or deny
        #[arg(long, default_value = "deny")]
        access_rule: AccessRule,
        /// Files up to this size are mirrored into the database
        #[arg(long)]
        max_mirrored_bytes: Option<i64>,
        /// Groups of the root directory
        #[command(flatten)]
        groups: GroupArgs,
    },
    /// List stores
    List,
    /// Rebuild a store's search index
    Reindex {
        /// Store name
        name: String,
    },
}

/// Execute a store command.
pub async fn execute(args: &StoreArgs, app: &App, format: OutputFormat) -> AppResult<()> {
    match &args.command {
        StoreCommands::Create {
            name,
            path,
            description,
            access_rule,
            max_mirrored_bytes,
            groups,
        } => {
            let store = app
                .stores
                .create(CreateStoreRequest {
                    name: name.clone(),
                    description: description.clone(),
                    path: path.clone(),
                    max_mirrored_file_size_bytes: *max_mirrored_bytes,
                    access_rule: *access_rule,
                    root_groups: groups.to_groups(),
                })
                .await?;
            app.pipeline.services().queues.register_store(store.id);
            output::print_item(StoreRow::from(&store), format);
        }
        StoreCommands::List => {
            let rows: Vec<StoreRow> = app.stores.list().await?.iter().map(StoreRow::from).collect();
            output::print_list(&rows, format);
        }
        StoreCommands::Reindex { name } => {
            let store = app.stores.get_by_name(name).await?;
            let count = app.pipeline.reindex_store(store.id)?.wait().await?;
            output::print_success(&format!("Reindexed {count} files in '{}'", store.name));
        }
    }
    Ok(())
}
