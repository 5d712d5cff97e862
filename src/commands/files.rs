//! Commands that change the tree.

use std::path::PathBuf;

use clap::Args;
use uuid::Uuid;

use treevault_core::result::AppResult;
use treevault_entity::resource::Resource;
use treevault_worker::{AddFileRequest, ResourceChanges};

use super::GroupArgs;
use crate::app::App;
use crate::output::{self, OutputFormat, ResourceRow};

/// Mkdir arguments.
#[derive(Debug, Args)]
pub struct MkdirArgs {
    /// Location of the new directory as `<store>:<path>`
    pub location: String,
    /// Description
    #[arg(long)]
    pub description: Option<String>,
    /// Declared groups
    #[command(flatten)]
    pub groups: GroupArgs,
}

/// Put arguments.
#[derive(Debug, Args)]
pub struct PutArgs {
    /// Local file to copy in
    pub source: PathBuf,
    /// Destination directory as `<store>:<path>`
    pub dest: String,
    /// Name in the store, defaults to the source file name
    #[arg(long)]
    pub name: Option<String>,
    /// Description
    #[arg(long)]
    pub description: Option<String>,
    /// Replace a file with the same name
    #[arg(long)]
    pub replace: bool,
    /// Declared groups
    #[command(flatten)]
    pub groups: GroupArgs,
}

/// Copy and move arguments.
#[derive(Debug, Args)]
pub struct TransferArgs {
    /// Source as `<store>:<path>`
    pub source: String,
    /// Destination directory as `<store>:<path>`
    pub dest: String,
    /// Replace files with the same name
    #[arg(long)]
    pub replace: bool,
}

/// Rm arguments.
#[derive(Debug, Args)]
pub struct RmArgs {
    /// Location as `<store>:<path>`
    pub location: String,
}

/// Rename arguments.
#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Location as `<store>:<path>`
    pub location: String,
    /// New name
    pub name: String,
}

fn split_last(location: &str) -> (&str, &str) {
    let trimmed = location.trim_end_matches('/');
    trimmed.rsplit_once('/').unwrap_or((trimmed, ""))
}

/// Create a directory.
pub async fn mkdir(args: &MkdirArgs, app: &App, user: Option<Uuid>, format: OutputFormat) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (parent_location, name) = split_last(&args.location);
    let parent = app.locate(parent_location).await?;
    let dir = app
        .pipeline
        .add_directory(&ctx, parent, name, args.description.clone(), args.groups.to_groups())
        .await?
        .wait()
        .await?;
    output::print_item(ResourceRow::from(&Resource::Directory(dir)), format);
    Ok(())
}

/// Copy a local file into a directory.
pub async fn put(args: &PutArgs, app: &App, user: Option<Uuid>, format: OutputFormat) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let dir = app.locate(&args.dest).await?;
    let file = app
        .pipeline
        .add_file(
            &ctx,
            AddFileRequest {
                dir,
                source: args.source.clone(),
                name: args.name.clone(),
                description: args.description.clone(),
                groups: args.groups.to_groups(),
                replace_existing: args.replace,
            },
        )
        .await?
        .wait()
        .await?;
    output::print_item(ResourceRow::from(&Resource::File(file)), format);
    Ok(())
}

/// Copy a file or a directory subtree.
pub async fn copy(args: &TransferArgs, app: &App, user: Option<Uuid>, format: OutputFormat) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (source, resource) = app.resource_at(&args.source).await?;
    let dest = app.locate(&args.dest).await?;
    let copied = match resource {
        Resource::File(_) => Resource::File(
            app.pipeline
                .copy_file(&ctx, source, dest, args.replace)
                .await?
                .wait()
                .await?,
        ),
        Resource::Directory(_) => Resource::Directory(
            app.pipeline
                .copy_directory(&ctx, source, dest, args.replace)
                .wait()
                .await?,
        ),
    };
    output::print_item(ResourceRow::from(&copied), format);
    Ok(())
}

/// Move a file or a directory subtree.
pub async fn move_to(args: &TransferArgs, app: &App, user: Option<Uuid>, format: OutputFormat) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (source, resource) = app.resource_at(&args.source).await?;
    let dest = app.locate(&args.dest).await?;
    let moved = match resource {
        Resource::File(_) => Resource::File(
            app.pipeline
                .move_file(&ctx, source, dest, args.replace)
                .await?
                .wait()
                .await?,
        ),
        Resource::Directory(_) => Resource::Directory(app.pipeline.move_directory(&ctx, source, dest).wait().await?),
    };
    output::print_item(ResourceRow::from(&moved), format);
    Ok(())
}

/// Remove a file or a directory subtree.
pub async fn remove(args: &RmArgs, app: &App, user: Option<Uuid>) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (target, resource) = app.resource_at(&args.location).await?;
    match resource {
        Resource::File(_) => {
            app.pipeline.remove_file(&ctx, target).await?.wait().await?;
            output::print_success(&format!("Removed {}", args.location));
        }
        Resource::Directory(_) => {
            let count = app.pipeline.remove_directory(&ctx, target).await?.wait().await?;
            output::print_success(&format!("Removed {} ({count} nodes)", args.location));
        }
    }
    Ok(())
}

/// Rename a file or directory.
pub async fn rename(args: &RenameArgs, app: &App, user: Option<Uuid>, format: OutputFormat) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let (target, resource) = app.resource_at(&args.location).await?;
    let changes = ResourceChanges::rename(args.name.clone());
    let renamed = match resource {
        Resource::File(_) => Resource::File(app.pipeline.update_file(&ctx, target, changes).await?.wait().await?),
        Resource::Directory(_) => Resource::Directory(
            app.pipeline
                .update_directory(&ctx, target, changes)
                .await?
                .wait()
                .await?,
        ),
    };
    output::print_item(ResourceRow::from(&renamed), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_last_keeps_store_prefix() {
        assert_eq!(split_last("docs:/reports/2024"), ("docs:/reports", "2024"));
        assert_eq!(split_last("docs:/reports/"), ("docs:", "reports"));
        assert_eq!(split_last("docs:/reports"), ("docs:", "reports"));
    }
}
