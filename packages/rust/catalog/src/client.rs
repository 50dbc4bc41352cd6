//! Thin HTTP client for the Atlas v2 catalog API.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use metaenrich_shared::{EnrichError, Result};

use crate::USER_AGENT;
use crate::auth::AccessToken;

/// Longest error body echoed back in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Authenticated catalog client bound to one data-plane endpoint.
pub struct CatalogClient {
    client: Client,
    endpoint: String,
    bearer: String,
}

impl CatalogClient {
    pub fn new(endpoint: &str, token: &AccessToken) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EnrichError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bearer: token.token.clone(),
        })
    }

    /// `GET /catalog/api/atlas/v2/entity/guid/{guid}`
    pub async fn entity(&self, guid: &str) -> Result<Value> {
        let url = format!("{}/catalog/api/atlas/v2/entity/guid/{guid}", self.endpoint);
        self.get_json(&url).await
    }

    /// `GET /catalog/api/atlas/v2/lineage/{guid}?depth=..&direction=BOTH`
    pub async fn lineage(&self, guid: &str, depth: u32) -> Result<Value> {
        let url = format!(
            "{}/catalog/api/atlas/v2/lineage/{guid}?depth={depth}&direction=BOTH",
            self.endpoint
        );
        self.get_json(&url).await
    }

    /// Any non-success status is fatal; there is no retry.
    #[instrument(skip(self))]
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer)
            .send()
            .await
            .map_err(|e| EnrichError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(EnrichError::Catalog(format!("{url}: HTTP {status}: {body}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| EnrichError::Catalog(format!("{url}: invalid JSON body: {e}")))?;

        debug!(%status, "catalog response received");
        Ok(value)
    }
}
