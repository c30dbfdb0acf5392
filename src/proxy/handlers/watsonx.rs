// watsonx Handler
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::IntoResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::proxy::mappers::watsonx::{
    EmbeddingsRequest, EmbeddingsResponse, GenerateRequest, GenerateResponse,
};
use crate::proxy::server::AppState;
use crate::proxy::TokenManager;

/// Handle `POST /v1/generate`
pub async fn handle_generate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let request: GenerateRequest = parse_body(body)?;
    let payload = state.translator.translate_generate(&request)?;

    info!(
        "Generation request: model='{}', prompt_chars={}",
        payload.model_id(),
        request.prompt.chars().count()
    );

    let upstream = state.upstream.clone();
    let result = call_with_auth_retry(&state.token_manager, "generate", |token| {
        let upstream = upstream.clone();
        let payload = payload.clone();
        async move { upstream.generate(&payload, &token).await }
    })
    .await?;

    Ok(Json(GenerateResponse::from(result)))
}

/// Handle `POST /v1/embeddings`
pub async fn handle_embeddings(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let request: EmbeddingsRequest = parse_body(body)?;
    let payload = state.translator.translate_embeddings(&request)?;

    info!("Embeddings request: inputs={}", payload.inputs.len());

    let upstream = state.upstream.clone();
    let result = call_with_auth_retry(&state.token_manager, "embeddings", |token| {
        let upstream = upstream.clone();
        let payload = payload.clone();
        async move { upstream.embed(&payload, &token).await }
    })
    .await?;

    Ok(Json(EmbeddingsResponse::from(result)))
}

/// Decode a JSON body into a typed request, reporting any mismatch as a validation error
fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<T, GatewayError> {
    let Json(value) = body.map_err(|e| GatewayError::Validation(e.body_text()))?;
    serde_json::from_value(value).map_err(|e| GatewayError::Validation(format!("Invalid request: {}", e)))
}

/// Run an upstream call with a bearer token, retrying exactly once on auth rejection
///
/// The rejected token is invalidated and a fresh one fetched before the retry.
/// Errors from the token cache itself are returned as-is.
pub async fn call_with_auth_retry<T, F, Fut>(
    token_manager: &TokenManager,
    label: &str,
    call: F,
) -> Result<T, GatewayError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let credential = token_manager.get_token().await?;

    match call(credential.token.clone()).await {
        Err(GatewayError::Auth { status, message }) => {
            warn!(
                "Upstream {} rejected token {} ({:?}): {}, refreshing and retrying once",
                label,
                credential.redacted(),
                status,
                message
            );
            token_manager.invalidate(&credential.token).await;
            let fresh = token_manager.get_token().await?;
            call(fresh.token).await
        }
        other => other,
    }
}
