use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::GatewayError;
use crate::modules::oauth::{Credential, IamClient};

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, GatewayError>>>;

/// Caches the IAM bearer credential and refreshes it before expiry
///
/// Refreshes are single-flight: callers arriving while an exchange is in
/// progress await that same exchange. The exchange runs on its own task, so a
/// waiter that is dropped (caller disconnect) never cancels it for the others.
pub struct TokenManager {
    iam: Arc<IamClient>,
    cached: Arc<RwLock<Option<Credential>>>,
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
    refresh_margin: chrono::Duration,
}

impl TokenManager {
    /// Create new TokenManager
    pub fn new(iam: IamClient, refresh_margin_secs: u64) -> Self {
        Self {
            iam: Arc::new(iam),
            cached: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(Mutex::new(None)),
            refresh_margin: chrono::Duration::seconds(refresh_margin_secs as i64),
        }
    }

    /// Get a credential valid for at least the refresh margin
    pub async fn get_token(&self) -> Result<Credential, GatewayError> {
        if let Some(credential) = self.cached_fresh().await {
            return Ok(credential);
        }

        let refresh = {
            let mut in_flight = self.in_flight.lock().await;

            // Another caller may have finished a refresh while we waited
            if let Some(credential) = self.cached_fresh().await {
                return Ok(credential);
            }

            match in_flight.as_ref() {
                Some(refresh) => {
                    tracing::debug!("Joining in-flight token refresh");
                    refresh.clone()
                }
                None => {
                    let refresh = self.spawn_refresh();
                    *in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Drop the cached credential if it is still the one upstream rejected
    ///
    /// Returns true when the cache was cleared. A credential that was already
    /// replaced by a concurrent refresh is left alone.
    pub async fn invalidate(&self, rejected_token: &str) -> bool {
        let mut cached = self.cached.write().await;
        match cached.as_ref() {
            Some(credential) if credential.token == rejected_token => {
                tracing::warn!("Invalidating rejected token {}", credential.redacted());
                *cached = None;
                true
            }
            _ => false,
        }
    }

    async fn cached_fresh(&self) -> Option<Credential> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_fresh(self.refresh_margin))
            .cloned()
    }

    fn spawn_refresh(&self) -> RefreshFuture {
        let iam = self.iam.clone();
        let cached = self.cached.clone();
        let in_flight = self.in_flight.clone();
        let margin = self.refresh_margin;

        tracing::info!("Token missing or about to expire, refreshing...");

        let task = tokio::spawn(async move {
            let result = iam.request_token().await.and_then(|credential| {
                if credential.is_fresh(margin) {
                    Ok(credential)
                } else {
                    Err(GatewayError::Auth {
                        status: None,
                        message: format!(
                            "IAM issued a credential expiring at {}, inside the {}s refresh margin",
                            credential.expires_at,
                            margin.num_seconds()
                        ),
                    })
                }
            });

            // Same lock order as get_token. Holding both while publishing the
            // outcome keeps invalidate from landing between the cache write
            // and the slot clear.
            let mut slot = in_flight.lock().await;
            let mut cache = cached.write().await;
            match &result {
                Ok(credential) => {
                    *cache = Some(credential.clone());
                    tracing::info!("Token refreshed successfully!");
                }
                Err(e) => tracing::error!("Token refresh failed: {}", e),
            }
            *slot = None;
            result
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(GatewayError::Auth {
                    status: None,
                    message: format!("Token refresh task failed: {}", e),
                })
            })
        })
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn manager_for(server: &MockServer, margin_secs: u64) -> TokenManager {
        let http = crate::utils::http::create_client_with_proxy(5, true, None).unwrap();
        let iam = IamClient::new(http, server.url("/identity/token"), "test-api-key");
        TokenManager::new(iam, margin_secs)
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"tok-1","expires_in":3600}"#);
        });

        let manager = manager_for(&server, 60);
        let first = manager.get_token().await.unwrap();
        let second = manager.get_token().await.unwrap();

        assert_eq!(first, second);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .delay(Duration::from_millis(300))
                .body(r#"{"access_token":"shared-tok","expires_in":3600}"#);
        });

        let manager = Arc::new(manager_for(&server, 60));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.get_token().await }));
        }

        for handle in handles {
            let credential = handle.await.unwrap().unwrap();
            assert_eq!(credential.token, "shared-tok");
        }
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_credential_inside_margin_is_rejected() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"short-lived","expires_in":10}"#);
        });

        let manager = manager_for(&server, 60);
        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::Auth { status: None, .. }));

        // Nothing was cached, so no caller ever holds the short-lived token
        assert!(manager.cached_fresh().await.is_none());
        assert!(manager.cached.read().await.is_none());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_aging_credential_is_refreshed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"tok","expires_in":62}"#);
        });

        let manager = manager_for(&server, 60);
        let first = manager.get_token().await.unwrap();
        assert!(first.is_fresh(chrono::Duration::seconds(60)));
        manager.get_token().await.unwrap();
        mock.assert_calls(1);

        // Past the two seconds of headroom, the cached credential is inside the margin
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let second = manager.get_token().await.unwrap();
        assert!(second.is_fresh(chrono::Duration::seconds(60)));
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn test_invalidate_after_refresh_is_not_undone() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"tok-r","expires_in":3600}"#);
        });

        let manager = manager_for(&server, 60);
        let credential = manager.get_token().await.unwrap();

        // The refresh slot is already cleared when its result is observed
        assert!(manager.in_flight.lock().await.is_none());
        assert!(manager.invalidate(&credential.token).await);

        manager.get_token().await.unwrap();
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_exchange() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"tok-a","expires_in":3600}"#);
        });

        let manager = manager_for(&server, 60);
        let credential = manager.get_token().await.unwrap();

        assert!(!manager.invalidate("some-other-token").await);
        assert!(manager.invalidate(&credential.token).await);
        assert!(!manager.invalidate(&credential.token).await);

        manager.get_token().await.unwrap();
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(401)
                .delay(Duration::from_millis(200))
                .body("invalid api key");
        });

        let manager = Arc::new(manager_for(&server, 60));
        let (a, b) = tokio::join!(manager.get_token(), manager.get_token());

        assert!(matches!(a, Err(GatewayError::Auth { status: Some(401), .. })));
        assert_eq!(a, b);
        mock.assert_calls(1);

        // A later call tries again instead of replaying the failure
        assert!(manager.get_token().await.is_err());
        mock.assert_calls(2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_abort_refresh() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200)
                .header("content-type", "application/json")
                .delay(Duration::from_millis(300))
                .body(r#"{"access_token":"survivor","expires_in":3600}"#);
        });

        let manager = Arc::new(manager_for(&server, 60));

        let impatient = tokio::time::timeout(Duration::from_millis(50), manager.get_token()).await;
        assert!(impatient.is_err());

        let credential = manager.get_token().await.unwrap();
        assert_eq!(credential.token, "survivor");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_iam_timeout_is_upstream_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/identity/token");
            then.status(200).delay(Duration::from_secs(3)).body("{}");
        });

        let http = crate::utils::http::create_client_with_proxy(1, true, None).unwrap();
        let iam = IamClient::new(http, server.url("/identity/token"), "k");
        let manager = TokenManager::new(iam, 60);

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
    }
}
