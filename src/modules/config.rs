use serde_json;
use std::fs;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

/// Env var naming an optional JSON config file
const CONFIG_FILE_ENV: &str = "GATEWAY_CONFIG";

/// Proxy schemes reqwest is built to speak (`socks` feature)
const UPSTREAM_PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Load application config: defaults, then the JSON file named by
/// `GATEWAY_CONFIG` (if any), then environment overrides.
pub fn load_app_config() -> AppResult<AppConfig> {
    let mut config = match std::env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => load_config_file(Path::new(path.trim()))?,
        _ => AppConfig::new(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Read a JSON config file; absent keys keep their defaults
pub fn load_config_file(path: &Path) -> AppResult<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
}

/// Overlay environment variables onto the config
///
/// `lookup` abstracts the environment so tests do not mutate process state.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> AppResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let wx = &mut config.watsonx;
    if let Some(v) = get("IBMCLOUD_API_KEY") {
        wx.api_key = v;
    }
    if let Some(v) = get("WATSONX_PROJECT_ID") {
        wx.project_id = v;
    }
    if let Some(v) = get("WATSONX_API_URL") {
        wx.base_url = v;
    }
    if let Some(v) = get("WATSONX_IAM_URL") {
        wx.iam_url = v;
    }
    if let Some(v) = get("WATSONX_API_VERSION") {
        wx.api_version = v;
    }
    if let Some(v) = get("WATSONX_LLM_MODEL_ID") {
        wx.generation_model_id = v;
    }
    if let Some(v) = get("WATSONX_EMBEDDING_MODEL_ID") {
        wx.embedding_model_id = v;
    }
    if let Some(v) = get("WATSONX_VERIFY_TLS") {
        // Anything other than an explicit "false" keeps verification on
        wx.verify_tls = !v.eq_ignore_ascii_case("false");
    }
    if let Some(v) = get("WATSONX_USE_CHAT") {
        wx.use_chat = v.eq_ignore_ascii_case("true");
    }

    let proxy = &mut config.proxy;
    if let Some(v) = get("GATEWAY_PORT") {
        proxy.port = v
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid GATEWAY_PORT: {}", v)))?;
    }
    if let Some(v) = get("GATEWAY_ALLOW_LAN") {
        proxy.allow_lan_access = v.eq_ignore_ascii_case("true");
    }
    if let Some(v) = get("GATEWAY_REQUEST_TIMEOUT") {
        proxy.request_timeout = v
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid GATEWAY_REQUEST_TIMEOUT: {}", v)))?;
    }
    if let Some(v) = get("GATEWAY_UPSTREAM_PROXY") {
        proxy.upstream_proxy.enabled = true;
        proxy.upstream_proxy.url = v;
    }

    if let Some(v) = get("GATEWAY_LOG_DIR") {
        config.log_dir = Some(v);
    }

    Ok(())
}

/// Reject configurations the gateway cannot serve traffic with
pub fn validate_config(config: &AppConfig) -> AppResult<()> {
    let wx = &config.watsonx;
    let mut missing = Vec::new();
    if wx.api_key.trim().is_empty() {
        missing.push("IBMCLOUD_API_KEY");
    }
    if wx.project_id.trim().is_empty() {
        missing.push("WATSONX_PROJECT_ID");
    }
    if wx.base_url.trim().is_empty() {
        missing.push("WATSONX_API_URL");
    }
    if !missing.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required configuration: {}",
            missing.join(", ")
        )));
    }

    for (name, value) in [("WATSONX_API_URL", &wx.base_url), ("WATSONX_IAM_URL", &wx.iam_url)] {
        let parsed = url::Url::parse(value)
            .map_err(|e| AppError::Config(format!("Invalid {} {:?}: {}", name, value, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::Config(format!(
                "{} must be an http(s) URL, got {:?}",
                name, value
            )));
        }
    }

    let proxy = &config.proxy;
    if proxy.upstream_proxy.enabled {
        let parsed = url::Url::parse(&proxy.upstream_proxy.url).map_err(|e| {
            AppError::Config(format!(
                "Invalid GATEWAY_UPSTREAM_PROXY {:?}: {}",
                proxy.upstream_proxy.url, e
            ))
        })?;
        if !UPSTREAM_PROXY_SCHEMES.contains(&parsed.scheme()) {
            return Err(AppError::Config(format!(
                "GATEWAY_UPSTREAM_PROXY must use one of {:?}, got {:?}",
                UPSTREAM_PROXY_SCHEMES, proxy.upstream_proxy.url
            )));
        }
    }

    if proxy.request_timeout == 0 || proxy.iam_timeout == 0 {
        return Err(AppError::Config(format!(
            "request_timeout ({}) and iam_timeout ({}) must be at least 1 second",
            proxy.request_timeout, proxy.iam_timeout
        )));
    }

    if proxy.max_new_tokens_limit == 0
        || proxy.default_max_new_tokens == 0
        || proxy.default_max_new_tokens > proxy.max_new_tokens_limit
    {
        return Err(AppError::Config(format!(
            "default_max_new_tokens ({}) must be between 1 and max_new_tokens_limit ({})",
            proxy.default_max_new_tokens, proxy.max_new_tokens_limit
        )));
    }

    Ok(())
}
