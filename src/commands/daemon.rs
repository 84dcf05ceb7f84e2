use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::watch;

use crate::app::App;
use crate::model::{RepoId, ScheduleInfo};
use crate::notify::{ConsoleNotifier, Notifier};
use crate::state::KeyWatch;

/// Keep checking for releases on the stored schedule until interrupted
#[tracing::instrument(skip(app))]
pub async fn daemon(app: &App) -> Result<()> {
    let watched = app.registry.list_watched().await?.len();
    let info = app.state.schedule_info().await?;
    println!(
        "Watching {} repositories, checking every {} minutes. Press Ctrl-C to stop.",
        watched, info.period
    );

    let reporter = tokio::spawn(report(
        app.background.watch_handled_cycles(),
        app.notifier.clone(),
        info.period,
        Listeners {
            repos: app.registry.watch_repos(),
            schedule: app.state.watch_schedule_info(),
            rate_limit: app.state.watch_rate_limit(),
            token: app.state.watch_access_token(),
        },
    ));
    app.background.start_alarm_loop().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    app.background.stop();
    reporter.abort();
    Ok(())
}

/// Typed store listeners followed by the reporter.
struct Listeners {
    repos: KeyWatch<Vec<RepoId>>,
    schedule: KeyWatch<ScheduleInfo>,
    rate_limit: KeyWatch<u64>,
    token: KeyWatch<String>,
}

/// Prints the badge after every cycle, which counts as reading it, and
/// follows changes to the shared records.
async fn report(
    mut cycles: watch::Receiver<u64>,
    notifier: Arc<ConsoleNotifier>,
    mut period: u64,
    mut listeners: Listeners,
) {
    loop {
        tokio::select! {
            handled = cycles.changed() => match handled {
                Ok(()) => {
                    let badge = notifier.badge();
                    if !badge.is_empty() {
                        println!("[{}]", badge);
                        notifier.clear();
                    }
                }
                Err(_) => break,
            },
            list = listeners.repos.changed() => match list {
                Ok(list) => info!("Watch list now has {} repositories", list.map_or(0, |l| l.len())),
                Err(_) => break,
            },
            schedule = listeners.schedule.changed() => match schedule {
                Ok(Some(schedule)) if schedule.period != period => {
                    info!("Check period is now {} minutes", schedule.period);
                    period = schedule.period;
                }
                Ok(_) => {}
                Err(_) => break,
            },
            remaining = listeners.rate_limit.changed() => match remaining {
                Ok(Some(0)) => warn!("API rate limit exhausted, falling back to release feeds"),
                Ok(Some(n)) => debug!("API rate limit remaining: {}", n),
                Ok(None) => {}
                Err(_) => break,
            },
            value = listeners.token.changed() => match value {
                Ok(Some(t)) if !t.is_empty() => info!("Access token updated"),
                Ok(_) => warn!("Access token was rejected and removed. Run `ghrn authorize` again."),
                Err(_) => break,
            },
        }
    }
}
