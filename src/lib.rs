pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod health;
pub mod http;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod utils;
