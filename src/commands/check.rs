use anyhow::Result;
use log::debug;
use std::time::Duration;

use crate::app::App;
use crate::message::Message;
use crate::popup::{PopupView, progress_line, render_rows};

use super::expect_reply;

/// Check every watched repository now and print what changed
#[tracing::instrument(skip(app))]
pub async fn check(app: &App) -> Result<()> {
    let total = app.registry.list_watched().await?.len();
    if total == 0 {
        println!("No repositories watched.");
        return Ok(());
    }

    // An open view keeps the background from notifying about what we print.
    let (view, id) = PopupView::open(&app.bus);
    let mut events = app.bus.subscribe();
    let handled = app.background.handled_cycles();

    let reply = app.bus.send(Message::ReqCheckRepos).await;
    view.drain(&mut events);
    // Stay open until the release listener has seen this cycle's events.
    if view.finished().is_some()
        && tokio::time::timeout(
            Duration::from_secs(5),
            app.background.wait_handled_cycles(handled + 1),
        )
        .await
        .is_err()
    {
        debug!("Release listener did not catch up before closing the view");
    }
    view.close(&app.bus, id);
    expect_reply(reply)?;

    match view.finished() {
        Some(progress) => println!("{}", progress_line(&progress, total)),
        None => println!("A check is already running or the network is unreachable."),
    }

    let updated = view.updated();
    if updated.is_empty() {
        println!("No new releases.");
    } else {
        for row in render_rows(&updated) {
            println!("{}", row);
        }
    }
    Ok(())
}
