use anyhow::Result;
use log::debug;

use crate::app::App;
use crate::popup::render_rows;

/// List watched repositories with their latest known release
#[tracing::instrument(skip(app))]
pub async fn list(app: &App) -> Result<()> {
    let snapshots = app.registry.get_all_snapshots().await?;
    if snapshots.is_empty() {
        println!("No repositories watched.");
        return Ok(());
    }

    debug!("Found {} snapshot(s)", snapshots.len());
    for row in render_rows(&snapshots) {
        println!("{}", row);
    }
    Ok(())
}
