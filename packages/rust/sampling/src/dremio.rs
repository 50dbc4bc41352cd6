//! Dremio REST query engine.
//!
//! A session is a login token. Queries are submitted as jobs, polled until
//! they settle, then read back through the job results endpoint.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use metaenrich_shared::{EnrichError, QueryEngineSettings, Result};

use crate::table::SampleTable;
use crate::{QueryEngine, QuerySession, USER_AGENT};

/// Connects to a Dremio coordinator over its REST API.
pub struct DremioEngine {
    settings: QueryEngineSettings,
    client: Client,
}

impl DremioEngine {
    pub fn new(settings: QueryEngineSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| EnrichError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, client })
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct JobSubmitted {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    job_state: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct SchemaField {
    name: String,
}

#[derive(Deserialize)]
struct JobResults {
    #[serde(default)]
    schema: Vec<SchemaField>,
    #[serde(default)]
    rows: Vec<Map<String, Value>>,
}

#[async_trait]
impl QueryEngine for DremioEngine {
    #[instrument(skip_all, fields(base_url = %self.settings.base_url))]
    async fn connect(&self) -> Result<Box<dyn QuerySession>> {
        let url = format!("{}/apiv2/login", self.settings.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "userName": self.settings.username,
                "password": self.settings.password,
            }))
            .send()
            .await
            .map_err(|e| EnrichError::Query(format!("cannot reach query engine at {url}: {e}")))?;

        let login: LoginResponse = read_json(response, &url).await?;
        info!("query engine session opened");

        Ok(Box::new(DremioSession {
            client: self.client.clone(),
            base_url: self.settings.base_url.clone(),
            auth: format!("_dremio{}", login.token),
            poll_interval: self.settings.poll_interval,
        }))
    }
}

/// One authenticated Dremio session.
pub struct DremioSession {
    client: Client,
    base_url: String,
    auth: String,
    poll_interval: std::time::Duration,
}

impl DremioSession {
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(reqwest::header::AUTHORIZATION, &self.auth)
    }

    async fn submit(&self, sql: &str) -> Result<String> {
        let url = format!("{}/api/v3/sql", self.base_url);
        let response = self
            .authed(self.client.post(&url))
            .json(&json!({ "sql": sql }))
            .send()
            .await
            .map_err(|e| EnrichError::Query(format!("{url}: {e}")))?;
        let job: JobSubmitted = read_json(response, &url).await?;
        Ok(job.id)
    }

    /// Poll until the job completes. Failed or cancelled jobs are errors.
    async fn wait_for(&self, job_id: &str) -> Result<()> {
        let url = format!("{}/api/v3/job/{job_id}", self.base_url);
        loop {
            let response = self
                .authed(self.client.get(&url))
                .send()
                .await
                .map_err(|e| EnrichError::Query(format!("{url}: {e}")))?;
            let status: JobStatus = read_json(response, &url).await?;

            match status.job_state.as_str() {
                "COMPLETED" => return Ok(()),
                "FAILED" | "CANCELED" | "CANCELLED" => {
                    let reason = status.error_message.unwrap_or_else(|| "no reason given".into());
                    return Err(EnrichError::Query(format!(
                        "job {job_id} {}: {reason}",
                        status.job_state.to_lowercase()
                    )));
                }
                state => {
                    debug!(job_id, state, "job pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn results(&self, job_id: &str, limit: usize) -> Result<SampleTable> {
        let url = format!(
            "{}/api/v3/job/{job_id}/results?offset=0&limit={limit}",
            self.base_url
        );
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| EnrichError::Query(format!("{url}: {e}")))?;
        let results: JobResults = read_json(response, &url).await?;

        let columns = results.schema.into_iter().map(|f| f.name).collect();
        Ok(SampleTable::from_json_rows(columns, &results.rows))
    }
}

#[async_trait]
impl QuerySession for DremioSession {
    #[instrument(skip(self, sql))]
    async fn fetch(&mut self, sql: &str, limit: usize) -> Result<SampleTable> {
        let job_id = self.submit(sql).await?;
        debug!(%job_id, "query submitted");
        self.wait_for(&job_id).await?;
        let table = self.results(&job_id, limit).await?;
        info!(rows = table.len(), columns = table.columns.len(), "query results read");
        Ok(table)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let url = format!("{}/apiv2/login", self.base_url);
        let response = self
            .authed(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| EnrichError::Query(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::Query(format!("{url}: HTTP {status}")));
        }
        debug!("query engine session closed");
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(500).collect();
        return Err(EnrichError::Query(format!("{url}: HTTP {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| EnrichError::Query(format!("{url}: unexpected response: {e}")))
}
