// proxy module - watsonx.ai gateway service

pub mod config;
pub mod server;
pub mod token_manager;

pub mod handlers; // API endpoint handlers
pub mod mappers; // Protocol mappers
pub mod middleware; // Axum middleware
pub mod upstream; // Upstream client

pub use config::{ProxyConfig, WatsonxConfig};
pub use server::{AppState, AxumServer};
pub use token_manager::TokenManager;
