//! Wires the stores, fetcher, scheduler and background context together.

use anyhow::Result;
use std::sync::Arc;

use crate::auth::{EnvAuthorizer, GitHubCredentials};
use crate::background::Background;
use crate::config::Config;
use crate::fetcher::{FetchRelease, ReleaseFetcher};
use crate::http::HttpClient;
use crate::message::MessageBus;
use crate::notify::ConsoleNotifier;
use crate::registry::Registry;
use crate::runtime::Runtime;
use crate::scheduler::{Scheduler, TcpConnectivity};
use crate::state::StateStore;
use crate::store::Stores;

pub struct App {
    pub config: Config,
    pub stores: Stores,
    pub state: Arc<StateStore>,
    pub registry: Arc<Registry>,
    pub bus: Arc<MessageBus>,
    pub background: Arc<Background>,
    pub notifier: Arc<ConsoleNotifier>,
}

impl App {
    pub fn build(runtime: Arc<dyn Runtime>, config: Config) -> Result<Self> {
        let stores = config.stores(runtime.clone())?;
        let state = Arc::new(StateStore::new(stores.clone(), runtime.clone()));
        let http = HttpClient::new(config.client.clone());

        let fetcher: Arc<dyn FetchRelease> = Arc::new(ReleaseFetcher::new(
            http.clone(),
            config.api_url.as_str(),
            config.web_url.as_str(),
            state.clone(),
        ));
        let registry = Arc::new(Registry::new(stores.clone(), fetcher.clone()));
        let bus = Arc::new(MessageBus::new());
        let notifier = Arc::new(ConsoleNotifier::new());

        let scheduler = Arc::new(Scheduler::new(
            registry.clone(),
            fetcher,
            state.clone(),
            bus.clone(),
            Arc::new(TcpConnectivity::for_url(&config.api_url)?),
            Arc::new(GitHubCredentials::new(
                http,
                config.api_url.as_str(),
                state.clone(),
            )),
        ));
        let background = Arc::new(Background::new(
            registry.clone(),
            scheduler,
            state.clone(),
            bus.clone(),
            notifier.clone(),
            Arc::new(EnvAuthorizer::new(runtime)),
        ));

        Ok(Self {
            config,
            stores,
            state,
            registry,
            bus,
            background,
            notifier,
        })
    }
}
