//! Subtree listing.

use clap::Args;
use uuid::Uuid;

use treevault_core::result::AppResult;

use crate::app::App;
use crate::output::{self, OutputFormat, ResourceRow};

/// Tree arguments.
#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Location as `<store>:<path>`
    pub location: String,
    /// Levels below the location to include
    #[arg(long)]
    pub depth: Option<i32>,
}

/// Print the subtree with the acting user's resolved access.
pub async fn execute(
    args: &TreeArgs,
    app: &App,
    user: Option<Uuid>,
    format: OutputFormat,
) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (_, resource) = app.resource_at(&args.location).await?;
    let trees = &app.pipeline.services().trees;
    let tree = trees.subtree(&ctx, resource.node_id(), args.depth).await?;

    let rows: Vec<ResourceRow> = tree
        .pre_order()
        .into_iter()
        .map(|index| {
            let resource = tree.value(index);
            let name = if index == 0 {
                ResourceRow::from(resource).path
            } else {
                resource.path().path_name.clone()
            };
            let label = format!("{}{name}", "  ".repeat(tree.depth(index)));
            ResourceRow::new(resource, label)
        })
        .collect();
    output::print_list(&rows, format);
    Ok(())
}
