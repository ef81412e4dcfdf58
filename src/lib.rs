pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod loadtest;
pub mod models;
pub mod notify;
pub mod reorder;
pub mod stores;

pub use client::PortfolioClient;
pub use config::ClientConfig;
