//! # Connection Validator
//!
//! Mandatory preflight check run before any import. Three ordered,
//! short-circuiting phases:
//!
//! 1. **Credentials** - username and password are present and non-empty
//! 2. **Endpoint** - a minimal unauthenticated probe reaches the endpoint;
//!    any HTTP status below 500 proves the endpoint exists, 5xx means it is
//!    reachable but unhealthy, and transport failures are reported by cause
//!    (TLS / timeout / DNS / connection)
//! 3. **Functional query** - the total-count query executes and returns the
//!    expected shape, confirming the schema contract
//!
//! The first failing phase aborts validation; the import pipeline treats
//! any failure here as fatal.

use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::client::QueryClient;
use crate::error::{CatalogError, Result};

const PROBE_QUERY: &str = "query { __typename }";
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// The validation phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Credentials,
    Endpoint,
    FunctionalQuery,
}

impl ValidationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Endpoint => "endpoint",
            Self::FunctionalQuery => "functional-query",
        }
    }
}

impl std::fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a successful validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub credentials_ok: bool,
    pub endpoint_ok: bool,
    pub query_ok: bool,
    /// Total listings the functional query reported.
    pub total_listings: u64,
}

/// Three-phase connection validator.
pub struct ConnectionValidator {
    http: Arc<dyn HttpClient>,
    client: Arc<QueryClient>,
}

impl ConnectionValidator {
    pub fn new(http: Arc<dyn HttpClient>, client: Arc<QueryClient>) -> Self {
        Self { http, client }
    }

    /// Run all phases in order, stopping at the first failure.
    pub async fn validate(&self) -> Result<ValidationReport> {
        info!("Starting API connection validation");
        let mut report = ValidationReport::default();

        self.check_credentials()?;
        report.credentials_ok = true;
        info!("Credentials check passed");

        self.check_endpoint().await?;
        report.endpoint_ok = true;
        info!("Endpoint probe passed");

        report.total_listings = self.check_functional_query().await?;
        report.query_ok = true;
        info!(
            total_listings = report.total_listings,
            "API connection validation passed"
        );

        Ok(report)
    }

    fn check_credentials(&self) -> Result<()> {
        if self.client.credentials().is_empty() {
            error!("Validation failed: credentials missing or empty");
            return Err(CatalogError::Validation {
                phase: ValidationPhase::Credentials,
                message: "username and password must be configured and non-empty".to_string(),
            });
        }
        Ok(())
    }

    async fn check_endpoint(&self) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, &self.client.config().endpoint)
            .timeout(PROBE_TIMEOUT)
            .json(&json!({ "query": PROBE_QUERY }))?;

        match self.http.execute(request).await {
            Err(e) => {
                let message = describe_transport_failure(&e);
                error!(error = %e, "Validation failed: endpoint unreachable");
                Err(CatalogError::Validation {
                    phase: ValidationPhase::Endpoint,
                    message,
                })
            }
            Ok(response) if response.status >= 500 => {
                error!(
                    status = response.status,
                    "Validation failed: endpoint unhealthy"
                );
                Err(CatalogError::Validation {
                    phase: ValidationPhase::Endpoint,
                    message: format!(
                        "endpoint is reachable but returned server error HTTP {}; \
                         the catalog API may be temporarily unavailable",
                        response.status
                    ),
                })
            }
            // Any status below 500 proves the endpoint exists, even when it
            // rejects the unauthenticated probe.
            Ok(_) => Ok(()),
        }
    }

    async fn check_functional_query(&self) -> Result<u64> {
        self.client.total_count().await.map_err(|e| {
            error!(error = %e, "Validation failed: functional query");
            CatalogError::Validation {
                phase: ValidationPhase::FunctionalQuery,
                message: e.to_string(),
            }
        })
    }
}

fn describe_transport_failure(error: &BridgeError) -> String {
    match error {
        BridgeError::Tls(detail) => format!(
            "TLS negotiation with the endpoint failed: {detail}; check the certificate chain"
        ),
        BridgeError::Timeout(detail) => format!(
            "connection to the endpoint timed out: {detail}; check network and firewall settings"
        ),
        BridgeError::Dns(detail) => {
            format!("DNS resolution for the endpoint failed: {detail}; check DNS settings")
        }
        other => format!("endpoint is not reachable: {other}"),
    }
}
