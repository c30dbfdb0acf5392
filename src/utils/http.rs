use crate::proxy::config::UpstreamProxyConfig;
use reqwest::{Client, Proxy};

/// Create an HTTP client with timeout, TLS policy and optional upstream proxy
pub fn create_client_with_proxy(
    timeout_secs: u64,
    verify_tls: bool,
    proxy_config: Option<&UpstreamProxyConfig>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("watsonx-gateway/", env!("CARGO_PKG_VERSION")));

    if !verify_tls {
        tracing::warn!("TLS certificate verification disabled for upstream calls");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(config) = proxy_config {
        if config.enabled {
            let proxy = Proxy::all(&config.url).inspect_err(|e| {
                tracing::error!("Invalid proxy address: {}, error: {}", config.url, e)
            })?;
            builder = builder.proxy(proxy);
            tracing::info!("HTTP client upstream proxy enabled: {}", config.url);
        }
    }

    builder.build()
}

/// Upper bound on upstream error text kept for logs and caller messages
pub const MAX_ERROR_BODY_BYTES: usize = 4096;

/// Cut `text` to at most `max_bytes`, on a char boundary, marking the cut
pub fn truncate_error_body(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let dropped = text.len() - end;
    text.truncate(end);
    text.push_str(&format!("... [{} bytes truncated]", dropped));
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_proxy_is_an_error() {
        let config = UpstreamProxyConfig {
            enabled: true,
            url: "::not a url::".into(),
        };
        assert!(create_client_with_proxy(5, true, Some(&config)).is_err());
    }

    #[test]
    fn test_disabled_proxy_is_ignored() {
        let config = UpstreamProxyConfig {
            enabled: false,
            url: "::not a url::".into(),
        };
        assert!(create_client_with_proxy(5, true, Some(&config)).is_ok());
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate_error_body("short".into(), 16), "short");

        let long = "é".repeat(10);
        let cut = truncate_error_body(long, 5);
        assert!(cut.starts_with("éé"));
        assert!(cut.ends_with("... [16 bytes truncated]"));
    }
}
