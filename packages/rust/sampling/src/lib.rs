//! Sample extraction: draw a bounded random sample of a table from the query
//! engine.
//!
//! This crate provides:
//! - [`QueryEngine`] / [`QuerySession`]: the seam between sampling and the
//!   engine that runs the SQL
//! - [`dremio`]: the Dremio REST implementation
//! - [`table`]: the in-memory [`SampleTable`] and its CSV form

pub mod dremio;
pub mod table;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use metaenrich_shared::{EnrichError, MAX_SAMPLE_ROWS, Result};

pub use dremio::DremioEngine;
pub use table::SampleTable;

/// User-Agent string for query engine requests.
pub(crate) const USER_AGENT: &str = concat!("metaenrich/", env!("CARGO_PKG_VERSION"));

/// Opens sessions against a SQL query engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn QuerySession>>;
}

/// One open engine session. Must be closed by the caller.
#[async_trait]
pub trait QuerySession: Send {
    /// Run `sql` and return at most `limit` rows.
    async fn fetch(&mut self, sql: &str, limit: usize) -> Result<SampleTable>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Quote a dotted table path for SQL.
///
/// A name that already starts with `"` is taken as pre-quoted and used
/// verbatim. Otherwise every dot-separated segment is wrapped in double
/// quotes with embedded quotes doubled.
pub fn quote_table(name: &str) -> String {
    let name = name.trim();
    if name.starts_with('"') {
        return name.to_string();
    }
    name.split('.')
        .map(|segment| format!("\"{}\"", segment.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Random-sample query for `table`.
pub fn sample_query(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {} ORDER BY RANDOM() LIMIT {limit}", quote_table(table))
}

/// Draw up to `limit` random rows (capped at [`MAX_SAMPLE_ROWS`]) from
/// `table`. The session is closed whether or not the query succeeds.
#[instrument(skip(engine))]
pub async fn draw_sample(engine: &dyn QueryEngine, table: &str, limit: usize) -> Result<SampleTable> {
    if table.trim().is_empty() {
        return Err(EnrichError::validation("target table is empty"));
    }
    let limit = limit.clamp(1, MAX_SAMPLE_ROWS);
    let sql = sample_query(table, limit);

    let mut session = engine.connect().await?;
    let fetched = session.fetch(&sql, limit).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close query engine session");
    }

    let mut table = fetched?;
    table.truncate(limit);
    info!(rows = table.len(), "sample drawn");
    Ok(table)
}
