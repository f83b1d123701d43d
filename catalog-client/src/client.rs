//! # Catalog Query Client
//!
//! Executes GraphQL documents against the vehicle catalog API with Basic
//! authentication, a fixed request timeout, and a bounded retry budget.
//!
//! ## Retry policy
//!
//! Transport-level failures (timeout, connection, DNS, TLS) and HTTP 5xx
//! responses are retried up to [`ClientConfig::max_retries`] additional
//! times with exponential backoff (2 s, 4 s, 8 s). HTTP 4xx, malformed
//! JSON, and a GraphQL `errors` array fail immediately: those outcomes do
//! not improve on retry. Every attempt is logged with its attempt number.

use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{CatalogError, Result};
use crate::queries;
use crate::types::{
    GraphqlResponse, IdsPageData, ListingsPage, SingleListingData, TotalCountData,
};

/// Basic-auth credential pair for the catalog API.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl ApiCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

/// Query client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// GraphQL endpoint URL.
    pub endpoint: String,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Additional attempts after the first failure.
    pub max_retries: u32,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

/// GraphQL client for the remote vehicle catalog.
pub struct QueryClient {
    http: Arc<dyn HttpClient>,
    credentials: ApiCredentials,
    config: ClientConfig,
}

impl QueryClient {
    pub fn new(http: Arc<dyn HttpClient>, credentials: ApiCredentials, config: ClientConfig) -> Self {
        Self {
            http,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    /// Execute a GraphQL document and return the `data` payload.
    pub async fn request(
        &self,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if self.credentials.is_empty() {
            error!("Catalog query attempted without credentials");
            return Err(CatalogError::EmptyCredentials);
        }

        let payload = json!({ "query": document, "variables": variables });
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, "Executing catalog query");

            let request = HttpRequest::new(HttpMethod::Post, &self.config.endpoint)
                .basic_auth(&self.credentials.username, &self.credentials.password)
                .timeout(self.config.request_timeout)
                .json(&payload)?;

            match self.http.execute(request).await {
                Err(e) if e.is_transport() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Transport failure, retrying catalog query"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transport() => {
                    error!(attempts = attempt + 1, error = %e, "Catalog query failed");
                    return Err(CatalogError::Transport {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                Err(e) => {
                    error!(attempt = attempt + 1, error = %e, "Catalog query failed");
                    return Err(e.into());
                }
                Ok(response) if response.is_server_error() => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        warn!(
                            attempt,
                            status = response.status,
                            delay_secs = delay.as_secs(),
                            "Server error, retrying catalog query"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        error!(
                            attempts = attempt + 1,
                            status = response.status,
                            "Catalog query failed with server error"
                        );
                        return Err(CatalogError::Http {
                            status: response.status,
                            message: response.text().unwrap_or_default(),
                        });
                    }
                }
                Ok(response) if response.status != 200 => {
                    error!(
                        attempt = attempt + 1,
                        status = response.status,
                        "Catalog query rejected"
                    );
                    return Err(CatalogError::Http {
                        status: response.status,
                        message: response.text().unwrap_or_default(),
                    });
                }
                Ok(response) => {
                    let envelope: GraphqlResponse =
                        serde_json::from_slice(&response.body).map_err(|e| {
                            error!(attempt = attempt + 1, "Failed to parse catalog response");
                            CatalogError::Malformed(format!("invalid JSON body: {}", e))
                        })?;

                    if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
                        error!(
                            attempt = attempt + 1,
                            message = %errors[0].message,
                            "Catalog query returned errors"
                        );
                        return Err(CatalogError::Query(errors[0].message.clone()));
                    }

                    let data = envelope
                        .data
                        .ok_or_else(|| CatalogError::Malformed("response has no data".into()))?;

                    debug!(attempt = attempt + 1, "Catalog query succeeded");
                    return Ok(data);
                }
            }
        }
    }

    /// Total number of listings currently published in the remote catalog.
    pub async fn total_count(&self) -> Result<u64> {
        let data = self.request(&queries::total_count_query(), json!({})).await?;
        let parsed: TotalCountData = serde_json::from_value(data)
            .map_err(|e| CatalogError::Malformed(format!("unexpected count shape: {}", e)))?;
        Ok(parsed.listings.metadata.total_items)
    }

    /// Fetch one page of listing summaries (ids + change timestamps).
    pub async fn fetch_id_page(&self, page: u32, size: u32) -> Result<ListingsPage> {
        let data = self
            .request(&queries::ids_page_query(page, size), json!({}))
            .await?;
        let parsed: IdsPageData = serde_json::from_value(data)
            .map_err(|e| CatalogError::Malformed(format!("unexpected id page shape: {}", e)))?;
        Ok(parsed.search.listings)
    }

    /// Fetch the full raw record for one listing.
    ///
    /// Returns the raw JSON node so the pluggable record mapper owns all
    /// field interpretation.
    pub async fn fetch_listing(&self, external_id: &str) -> Result<serde_json::Value> {
        let data = self
            .request(&queries::single_listing_query(external_id), json!({}))
            .await?;
        let parsed: SingleListingData = serde_json::from_value(data)
            .map_err(|e| CatalogError::Malformed(format!("unexpected listing shape: {}", e)))?;

        parsed
            .listing
            .filter(|node| !node.is_null())
            .ok_or_else(|| CatalogError::ListingNotFound(external_id.to_string()))
    }
}

/// Backoff before retry number `attempt` (1-based): 2 s, 4 s, 8 s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{error::BridgeError, HttpResponse};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Scripted {
        Transport(fn(String) -> BridgeError),
        Status(u16, &'static str),
        Body(serde_json::Value),
    }

    struct ScriptedHttpClient {
        script: Mutex<Vec<Scripted>>,
        requests_seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script),
                requests_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn execute(
            &self,
            request: HttpRequest,
        ) -> bridge_traits::error::Result<HttpResponse> {
            self.requests_seen.lock().unwrap().push(request);
            let next = self.script.lock().unwrap().remove(0);
            match next {
                Scripted::Transport(make) => Err(make("scripted failure".to_string())),
                Scripted::Status(status, body) => Ok(HttpResponse {
                    status,
                    headers: HashMap::new(),
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Scripted::Body(value) => Ok(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: Bytes::from(serde_json::to_vec(&value).unwrap()),
                }),
            }
        }
    }

    fn client_with(script: Vec<Scripted>) -> QueryClient {
        QueryClient::new(
            Arc::new(ScriptedHttpClient::new(script)),
            ApiCredentials::new("dealer", "secret"),
            ClientConfig::new("https://catalog.example.test/graphql"),
        )
    }

    fn count_body(total: u64) -> serde_json::Value {
        json!({
            "data": {
                "listings": {
                    "metadata": {
                        "totalItems": total,
                        "totalPages": 1,
                        "pageSize": 50,
                        "currentPage": 1
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let client = QueryClient::new(
            Arc::new(ScriptedHttpClient::new(vec![])),
            ApiCredentials::new("", ""),
            ClientConfig::new("https://catalog.example.test/graphql"),
        );

        let err = client.total_count().await.unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_timeouts_with_backoff() {
        let client = client_with(vec![
            Scripted::Transport(BridgeError::Timeout),
            Scripted::Transport(BridgeError::Timeout),
            Scripted::Body(count_body(7)),
        ]);

        let started = tokio::time::Instant::now();
        let total = client.total_count().await.unwrap();

        assert_eq!(total, 7);
        // Two failures cost 2 s + 4 s of backoff.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let client = client_with(vec![
            Scripted::Transport(BridgeError::Connection),
            Scripted::Transport(BridgeError::Connection),
            Scripted::Transport(BridgeError::Connection),
            Scripted::Transport(BridgeError::Connection),
        ]);

        let err = client.total_count().await.unwrap_err();
        match err {
            CatalogError::Transport { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_retried_then_succeeds() {
        let client = client_with(vec![
            Scripted::Status(503, "unavailable"),
            Scripted::Body(count_body(3)),
        ]);

        assert_eq!(client.total_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let client = client_with(vec![Scripted::Status(401, "unauthorized")]);

        let err = client.total_count().await.unwrap_err();
        match err {
            CatalogError::Http { status, .. } => assert_eq!(status, 401),
            other => panic!("expected http error, got {other:?}"),
        }
        assert_eq!(err.kind(), "protocol");
    }

    #[tokio::test]
    async fn test_graphql_errors_array_not_retried() {
        let client = client_with(vec![Scripted::Body(json!({
            "data": null,
            "errors": [{ "message": "listing limit exceeded" }]
        }))]);

        let err = client.total_count().await.unwrap_err();
        match err {
            CatalogError::Query(message) => assert_eq!(message, "listing limit exceeded"),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_fails() {
        let client = client_with(vec![Scripted::Status(200, "not json at all")]);

        let err = client.total_count().await.unwrap_err();
        assert!(matches!(err, CatalogError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fetch_listing_not_found() {
        let client = client_with(vec![Scripted::Body(json!({
            "data": { "listing": null }
        }))]);

        let err = client.fetch_listing("missing-guid").await.unwrap_err();
        assert!(matches!(err, CatalogError::ListingNotFound(_)));
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_request_carries_basic_auth_and_timeout() {
        let http = Arc::new(ScriptedHttpClient::new(vec![Scripted::Body(count_body(0))]));
        let client = QueryClient::new(
            http.clone(),
            ApiCredentials::new("dealer", "secret"),
            ClientConfig::new("https://catalog.example.test/graphql"),
        );

        client.total_count().await.unwrap();

        let seen = http.requests_seen.lock().unwrap();
        let request = &seen[0];
        assert!(request
            .headers
            .get("Authorization")
            .unwrap()
            .starts_with("Basic "));
        assert_eq!(request.timeout, Some(Duration::from_secs(60)));
    }
}
