//! Zip export.

use clap::Args;
use uuid::Uuid;

use treevault_core::result::AppResult;

use crate::app::App;
use crate::output;

/// Export arguments.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Locations as `<store>:<path>`
    #[arg(required = true)]
    pub locations: Vec<String>,
    /// Archive file name
    #[arg(long)]
    pub name: Option<String>,
}

/// Write the selected resources into one archive.
pub async fn execute(args: &ExportArgs, app: &App, user: Option<Uuid>) -> AppResult<()> {
    let ctx = app.context(user).await?;
    let mut targets = Vec::with_capacity(args.locations.len());
    for location in &args.locations {
        targets.push(app.locate(location).await?);
    }

    let handle = app.pipeline.zip_export(&ctx, targets, args.name.clone());
    let result = handle.wait().await?;
    output::print_success(&format!(
        "Exported {} files to {}",
        result.file_count,
        result.archive_path.display()
    ));
    Ok(())
}
