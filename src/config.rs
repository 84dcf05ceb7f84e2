use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::store::{FileStore, StoreArea, Stores};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_WEB_URL: &str = "https://github.com";
pub const USER_AGENT: &str = "ghrn-cli";

pub const SYNC_FILE: &str = "sync.json";
pub const LOCAL_FILE: &str = "local.json";

pub struct Config {
    pub client: Client,
    pub api_url: String,
    pub web_url: String,
    pub root: PathBuf,
}

impl Config {
    pub fn new(
        runtime: &dyn Runtime,
        root: Option<PathBuf>,
        api_url: Option<String>,
        web_url: Option<String>,
    ) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root(runtime)?,
        };
        let api_url = normalize_url(api_url.as_deref().unwrap_or(DEFAULT_API_URL));
        let web_url = normalize_url(web_url.as_deref().unwrap_or(DEFAULT_WEB_URL));
        debug!("Data directory {:?}, API {}, web {}", root, api_url, web_url);

        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            api_url,
            web_url,
            root,
        })
    }

    /// The Synced and Local stores, backed by JSON files in the data directory.
    pub fn stores(&self, runtime: Arc<dyn Runtime>) -> Result<Stores> {
        if !runtime.exists(&self.root) {
            runtime
                .create_dir_all(&self.root)
                .with_context(|| format!("Failed to create data directory {:?}", self.root))?;
        }
        Ok(Stores::new(
            Arc::new(FileStore::new(
                runtime.clone(),
                StoreArea::Synced,
                self.root.join(SYNC_FILE),
            )),
            Arc::new(FileStore::new(
                runtime,
                StoreArea::Local,
                self.root.join(LOCAL_FILE),
            )),
        ))
    }
}

/// `<home>/.ghrn`
pub fn default_root(runtime: &dyn Runtime) -> Result<PathBuf> {
    let home = runtime
        .home_dir()
        .context("Could not determine home directory. Use --root to choose a data directory.")?;
    Ok(home.join(".ghrn"))
}

fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
