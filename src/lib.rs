pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Gateway service module
pub mod utils;

use std::path::Path;
use std::sync::Arc;

use error::{AppError, AppResult};
use models::AppConfig;
use modules::oauth::IamClient;
use proxy::mappers::watsonx::RequestTranslator;
use proxy::upstream::client::UpstreamClient;
use proxy::{AppState, AxumServer, TokenManager};
use tracing::{error, info};

/// Wire the token cache, translator and upstream client from config
pub fn build_state(config: &AppConfig) -> AppResult<AppState> {
    let wx = &config.watsonx;
    let proxy = &config.proxy;

    // IAM is a public IBM Cloud endpoint; the TLS toggle only covers watsonx
    let iam_http =
        utils::http::create_client_with_proxy(proxy.iam_timeout, true, Some(&proxy.upstream_proxy))?;
    let upstream_http = utils::http::create_client_with_proxy(
        proxy.request_timeout,
        wx.verify_tls,
        Some(&proxy.upstream_proxy),
    )?;

    let iam = IamClient::new(iam_http, wx.iam_url.clone(), wx.api_key.clone());

    Ok(AppState {
        token_manager: Arc::new(TokenManager::new(iam, proxy.token_refresh_margin)),
        translator: Arc::new(RequestTranslator::new(wx, proxy)),
        upstream: Arc::new(UpstreamClient::new(upstream_http, &wx.base_url, &wx.api_version)),
    })
}

/// Load config, start the gateway and serve until Ctrl-C
pub async fn run() -> AppResult<()> {
    let config = match modules::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            // Logging may not be configured yet; make sure the reason is visible
            modules::init_logger(None);
            error!("Refusing to start: {}", e);
            return Err(e);
        }
    };

    modules::init_logger(config.log_dir.as_deref().map(Path::new));
    info!(
        "Starting gateway: base_url={}, project_id={}, generation_model={}, embedding_model={}, chat={}",
        config.watsonx.base_url,
        config.watsonx.project_id,
        config.watsonx.generation_model_id,
        config.watsonx.embedding_model_id,
        config.watsonx.use_chat
    );

    let state = build_state(&config)?;
    let (server, handle) = AxumServer::start(
        config.proxy.get_bind_address().to_string(),
        config.proxy.port,
        state,
    )
    .await
    .map_err(AppError::Server)?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    server.stop();
    if let Err(e) = handle.await {
        error!("Server task ended abnormally: {}", e);
    }
    Ok(())
}
