use anyhow::Result;

use crate::app::App;
use crate::message::Message;

use super::expect_reply;

/// Store the personal access token found in the environment
#[tracing::instrument(skip(app))]
pub async fn authorize(app: &App) -> Result<()> {
    expect_reply(app.bus.send(Message::Authorize).await)?;
    println!("Access token saved.");
    Ok(())
}
