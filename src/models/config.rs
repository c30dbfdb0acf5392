use crate::proxy::config::{ProxyConfig, WatsonxConfig};
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<String>,
    pub proxy: ProxyConfig,
    pub watsonx: WatsonxConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
