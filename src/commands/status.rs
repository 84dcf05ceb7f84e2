use anyhow::Result;

use crate::app::App;
use crate::popup::schedule_lines;

/// Show the check schedule, rate limit and authorization state
#[tracing::instrument(skip(app))]
pub async fn status(app: &App) -> Result<()> {
    let info = app.state.schedule_info().await?;
    let rate_limit = app.state.rate_limit_remaining().await?;
    let authorized = app.state.access_token().await?.is_some();
    let watched = app.registry.list_watched().await?.len();

    println!("Watching:        {} repositories", watched);
    for line in schedule_lines(&info, rate_limit, authorized) {
        println!("{}", line);
    }
    Ok(())
}

/// Change how often the background checks for releases
#[tracing::instrument(skip(app))]
pub async fn period(app: &App, minutes: u64) -> Result<()> {
    let info = app.state.set_period(minutes).await?;
    println!("Check period set to {} minutes", info.period);
    Ok(())
}
