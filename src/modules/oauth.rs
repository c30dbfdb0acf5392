use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::utils::http::{truncate_error_body, MAX_ERROR_BODY_BYTES};

/// IBM Cloud IAM grant type for API-key exchange
const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Lifetime assumed when IAM omits `expires_in`
const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Bearer credential issued by IAM
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// True when the credential stays valid for at least `margin`
    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.expires_at - margin > Utc::now()
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.token.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.redacted())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Client for the IAM token endpoint
pub struct IamClient {
    http_client: Client,
    token_url: String,
    api_key: String,
}

impl IamClient {
    pub fn new(http_client: Client, token_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Exchange the configured API key for a bearer credential
    ///
    /// A single attempt; retrying is left to the caller.
    pub async fn request_token(&self) -> Result<Credential, GatewayError> {
        let params = [
            ("grant_type", APIKEY_GRANT_TYPE),
            ("apikey", self.api_key.as_str()),
        ];

        tracing::info!("Requesting IAM token...");

        let response = self
            .http_client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::UpstreamUnavailable {
                        status: None,
                        message: format!("IAM token request timed out: {}", e),
                    }
                } else {
                    GatewayError::Auth {
                        status: None,
                        message: format!("IAM token request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = truncate_error_body(
                response.text().await.unwrap_or_default(),
                MAX_ERROR_BODY_BYTES,
            );
            tracing::error!("IAM token exchange rejected ({}): {}", status, error_text);
            return Err(GatewayError::Auth {
                status: Some(status.as_u16()),
                message: format!("IAM token exchange failed: {}", error_text),
            });
        }

        let token_res = response.json::<TokenResponse>().await.map_err(|e| GatewayError::Auth {
            status: Some(status.as_u16()),
            message: format!("IAM token parsing failed: {}", e),
        })?;

        if token_res.access_token.is_empty() {
            return Err(GatewayError::Auth {
                status: Some(status.as_u16()),
                message: "IAM returned an empty access_token".to_string(),
            });
        }
        if let Some(token_type) = &token_res.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(GatewayError::Auth {
                    status: Some(status.as_u16()),
                    message: format!("Unsupported IAM token type: {}", token_type),
                });
            }
        }

        let expires_in = token_res.expires_in.unwrap_or(DEFAULT_EXPIRES_IN).max(0);
        let credential = Credential {
            token: token_res.access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        };

        tracing::info!(
            "IAM token acquired: {}, expires in {} seconds",
            credential.redacted(),
            expires_in
        );
        Ok(credential)
    }
}
