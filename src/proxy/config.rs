use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_API_VERSION: &str = "2023-05-29";
pub const DEFAULT_IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
pub const DEFAULT_GENERATION_MODEL: &str = "mistralai/mistral-large";
pub const DEFAULT_EMBEDDING_MODEL: &str = "ibm/slate-125m-english-rtrvr";

/// Gateway server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Whether to accept connections from the network
    /// - false: loopback only, 127.0.0.1 (default)
    /// - true: all interfaces, 0.0.0.0
    pub allow_lan_access: bool,

    /// Listening port
    pub port: u16,

    /// Inference request timeout (seconds)
    pub request_timeout: u64,

    /// Identity token exchange timeout (seconds)
    pub iam_timeout: u64,

    /// Seconds before expiry at which a cached credential is refreshed
    pub token_refresh_margin: u64,

    /// Used when the caller omits `max_new_tokens`
    pub default_max_new_tokens: u32,

    /// Upper bound accepted for `max_new_tokens`
    pub max_new_tokens_limit: u32,

    /// Upstream proxy configuration
    pub upstream_proxy: UpstreamProxyConfig,
}

/// Upstream proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamProxyConfig {
    /// Whether enabled
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: 8000,
            request_timeout: 60,
            iam_timeout: 20,
            token_refresh_margin: 60,
            default_max_new_tokens: 256,
            max_new_tokens_limit: 4096,
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Get the actual listening address
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}

/// watsonx.ai connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatsonxConfig {
    /// IBM Cloud API key presented to IAM
    pub api_key: String,
    pub project_id: String,
    /// Region endpoint, e.g. https://eu-de.ml.cloud.ibm.com
    pub base_url: String,
    pub iam_url: String,
    pub api_version: String,
    pub generation_model_id: String,
    pub embedding_model_id: String,
    /// Verify upstream TLS certificates
    pub verify_tls: bool,
    /// Route generation through text/chat instead of text/generation
    pub use_chat: bool,
}

impl Default for WatsonxConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            base_url: String::new(),
            iam_url: DEFAULT_IAM_TOKEN_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            generation_model_id: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model_id: DEFAULT_EMBEDDING_MODEL.to_string(),
            verify_tls: true,
            use_chat: false,
        }
    }
}

impl fmt::Debug for WatsonxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatsonxConfig")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("base_url", &self.base_url)
            .field("iam_url", &self.iam_url)
            .field("api_version", &self.api_version)
            .field("generation_model_id", &self.generation_model_id)
            .field("embedding_model_id", &self.embedding_model_id)
            .field("verify_tls", &self.verify_tls)
            .field("use_chat", &self.use_chat)
            .finish()
    }
}
