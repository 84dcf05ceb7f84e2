pub mod app;
pub mod auth;
pub mod background;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod message;
pub mod model;
pub mod notify;
pub mod policy;
pub mod popup;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod store;
