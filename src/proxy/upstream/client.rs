// Upstream client implementation
// Authenticated calls to the watsonx.ai inference API

use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::utils::http::{truncate_error_body, MAX_ERROR_BODY_BYTES};
use crate::proxy::mappers::watsonx::{
    parse_chat_response, parse_embeddings_response, parse_generation_response, EmbeddingPayload,
    EmbeddingResult, GenerationPayload, GenerationResult,
};

pub struct UpstreamClient {
    http_client: Client,
    base_url: String,
    api_version: String,
}

impl UpstreamClient {
    pub fn new(http_client: Client, base_url: &str, api_version: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
        }
    }

    /// Build API request address
    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/ml/v1/{}?version={}",
            self.base_url, path, self.api_version
        )
    }

    pub async fn generate(
        &self,
        payload: &GenerationPayload,
        access_token: &str,
    ) -> Result<GenerationResult, GatewayError> {
        let (status, raw) = match payload {
            GenerationPayload::Text(body) => self.post_json(payload.path(), access_token, body).await?,
            GenerationPayload::Chat(body) => self.post_json(payload.path(), access_token, body).await?,
        };

        let parsed = match payload {
            GenerationPayload::Text(_) => parse_generation_response(status, raw),
            GenerationPayload::Chat(_) => parse_chat_response(status, raw),
        };
        parsed.inspect_err(|e| tracing::error!("watsonx {} response rejected: {}", payload.path(), e))
    }

    pub async fn embed(
        &self,
        payload: &EmbeddingPayload,
        access_token: &str,
    ) -> Result<EmbeddingResult, GatewayError> {
        let (status, raw) = self
            .post_json("text/embeddings", access_token, payload)
            .await?;

        parse_embeddings_response(status, raw, payload.inputs.len())
            .inspect_err(|e| tracing::error!("watsonx text/embeddings response rejected: {}", e))
    }

    /// POST a JSON body and return the parsed JSON of a 2xx response
    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        access_token: &str,
        body: &T,
    ) -> Result<(u16, Value), GatewayError> {
        let url = self.build_url(path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("watsonx {} request failed: {}", path, e);
                GatewayError::UpstreamUnavailable {
                    status: None,
                    message: if e.is_timeout() {
                        format!("watsonx {} request timed out", path)
                    } else {
                        format!("watsonx {} request failed: {}", path, e)
                    },
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = truncate_error_body(
                response.text().await.unwrap_or_default(),
                MAX_ERROR_BODY_BYTES,
            );
            tracing::warn!("watsonx {} returned {}: {}", path, status, error_text);
            return Err(classify_status(status, error_text));
        }

        let bytes = response.bytes().await.map_err(|e| GatewayError::UpstreamUnavailable {
            status: Some(status.as_u16()),
            message: format!("watsonx {} response body read failed: {}", path, e),
        })?;
        let raw: Value = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(
                "watsonx {} returned unparseable body (HTTP {}): {}",
                path,
                status,
                String::from_utf8_lossy(&bytes)
            );
            GatewayError::UpstreamProtocol {
                status: status.as_u16(),
                message: format!("Parse error: {}", e),
            }
        })?;

        Ok((status.as_u16(), raw))
    }
}

/// Map a non-success upstream status to the error taxonomy
pub fn classify_status(status: StatusCode, body: String) -> GatewayError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth {
            status: Some(code),
            message: body,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            GatewayError::UpstreamUnavailable {
                status: Some(code),
                message: body,
            }
        }
        s if s.is_client_error() => GatewayError::Request {
            status: code,
            message: body,
        },
        s if s.is_server_error() => GatewayError::UpstreamUnavailable {
            status: Some(code),
            message: body,
        },
        _ => GatewayError::UpstreamProtocol {
            status: code,
            message: format!("Unexpected status: {}", body),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::mappers::watsonx::{
        DecodingMethod, GenerationParameters, TextGenerationBody,
    };
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn client_for(server: &MockServer, timeout_secs: u64) -> UpstreamClient {
        let http =
            crate::utils::http::create_client_with_proxy(timeout_secs, true, None).unwrap();
        UpstreamClient::new(http, &server.base_url(), "2023-05-29")
    }

    fn text_payload() -> GenerationPayload {
        GenerationPayload::Text(TextGenerationBody {
            input: "Explain X briefly.".into(),
            model_id: "mistralai/mistral-large".into(),
            project_id: "proj-1".into(),
            parameters: GenerationParameters {
                decoding_method: DecodingMethod::Greedy,
                max_new_tokens: 64,
                temperature: None,
                top_p: None,
                top_k: None,
                repetition_penalty: None,
                stop_sequences: None,
            },
        })
    }

    fn mock_generation_status(server: &MockServer, status: u16, body: &str) {
        let body = body.to_string();
        server.mock(move |when, then| {
            when.method(POST).path("/ml/v1/text/generation");
            then.status(status).body(body);
        });
    }

    #[test]
    fn test_build_url() {
        let http = reqwest::Client::new();
        let client = UpstreamClient::new(http, "https://eu-de.ml.cloud.ibm.com/", "2023-05-29");
        assert_eq!(
            client.build_url("text/generation"),
            "https://eu-de.ml.cloud.ibm.com/ml/v1/text/generation?version=2023-05-29"
        );
    }

    #[tokio::test]
    async fn test_generate_attaches_token_and_version() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ml/v1/text/generation")
                .query_param("version", "2023-05-29")
                .header("authorization", "Bearer tok-1")
                .body_includes(r#""model_id":"mistralai/mistral-large""#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "model_id": "mistralai/mistral-large",
                    "results": [{"generated_text": "X is...", "stop_reason": "eos_token"}]
                }));
        });

        let result = client_for(&server, 5)
            .generate(&text_payload(), "tok-1")
            .await
            .unwrap();
        assert_eq!(result.text, "X is...");
        mock.assert();
    }

    #[tokio::test]
    async fn test_status_classification() {
        let cases: [(u16, fn(&GatewayError) -> bool); 6] = [
            (401, |e| matches!(e, GatewayError::Auth { status: Some(401), .. })),
            (403, |e| matches!(e, GatewayError::Auth { status: Some(403), .. })),
            (400, |e| matches!(e, GatewayError::Request { status: 400, .. })),
            (404, |e| matches!(e, GatewayError::Request { status: 404, .. })),
            (429, |e| matches!(e, GatewayError::UpstreamUnavailable { status: Some(429), .. })),
            (503, |e| matches!(e, GatewayError::UpstreamUnavailable { status: Some(503), .. })),
        ];

        for (status, check) in cases {
            let server = MockServer::start();
            mock_generation_status(&server, status, r#"{"errors":[{"code":"x"}]}"#);

            let err = client_for(&server, 5)
                .generate(&text_payload(), "tok")
                .await
                .unwrap_err();
            assert!(check(&err), "status {} classified as {:?}", status, err);
        }
    }

    #[tokio::test]
    async fn test_model_not_supported_keeps_body() {
        let server = MockServer::start();
        mock_generation_status(
            &server,
            400,
            r#"{"errors":[{"code":"model_not_supported","message":"Model 'string' is not supported"}]}"#,
        );

        let err = client_for(&server, 5)
            .generate(&text_payload(), "tok")
            .await
            .unwrap_err();
        match err {
            GatewayError::Request { message, .. } => assert!(message.contains("model_not_supported")),
            other => panic!("expected Request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_large_error_body_is_truncated() {
        let server = MockServer::start();
        let body = "x".repeat(64 * 1024);
        mock_generation_status(&server, 400, &body);

        let err = client_for(&server, 5)
            .generate(&text_payload(), "tok")
            .await
            .unwrap_err();
        match err {
            GatewayError::Request { status: 400, message } => {
                assert!(message.len() < MAX_ERROR_BODY_BYTES + 64);
                assert!(message.ends_with("bytes truncated]"));
            }
            other => panic!("expected Request error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let server = MockServer::start();
        mock_generation_status(&server, 200, "<html>gateway</html>");

        let err = client_for(&server, 5)
            .generate(&text_payload(), "tok")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamProtocol { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/ml/v1/text/generation");
            then.status(200).delay(Duration::from_secs(3)).body("{}");
        });

        let err = client_for(&server, 1)
            .generate(&text_payload(), "tok")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { status: None, .. }));
        assert_eq!(err.http_status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_embed_sends_inputs() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/ml/v1/text/embeddings")
                .body_includes(r#""inputs":["a","b"]"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"results": [{"embedding": [1.0]}, {"embedding": [2.0]}]}));
        });

        let payload = EmbeddingPayload {
            inputs: vec!["a".into(), "b".into()],
            model_id: "ibm/slate-125m-english-rtrvr".into(),
            project_id: "proj-1".into(),
        };
        let result = client_for(&server, 5).embed(&payload, "tok").await.unwrap();
        assert_eq!(result.vectors, vec![vec![1.0], vec![2.0]]);
        mock.assert();
    }
}
