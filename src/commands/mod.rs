use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::App;
use crate::config::Config;
use crate::message::Reply;
use crate::runtime::Runtime;

mod authorize;
mod check;
mod daemon;
mod list;
mod status;
mod watch;

pub use authorize::authorize;
pub use check::check;
pub use daemon::daemon;
pub use list::list;
pub use status::{period, status};
pub use watch::{unwatch, unwatch_all, watch};

/// Global options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub root: Option<PathBuf>,
    pub api_url: Option<String>,
    pub web_url: Option<String>,
}

/// Builds the application and attaches its background context to the bus.
pub async fn open(runtime: Arc<dyn Runtime>, options: Options) -> Result<App> {
    let config = Config::new(&*runtime, options.root, options.api_url, options.web_url)?;
    let app = App::build(runtime, config)?;
    app.background.attach().await?;
    Ok(app)
}

/// Unwraps a bus reply, turning a missing or failed answer into an error.
pub(crate) fn expect_reply(reply: Option<Reply>) -> Result<Reply> {
    match reply {
        None => anyhow::bail!("No background context answered the request"),
        Some(Reply::Failed(message)) => anyhow::bail!(message),
        Some(reply) => Ok(reply),
    }
}
