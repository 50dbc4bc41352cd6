//! Flat JSON token cache keyed by tenant and scope.
//!
//! ```json
//! { "contoso|https://purview.azure.net/.default":
//!     { "access_token": "...", "expires_on": "2026-10-17T12:00:00Z" } }
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use metaenrich_shared::{EnrichError, Result};

use crate::auth::AccessToken;

/// A cached token is reused only while it has more than this left.
pub const EXPIRY_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    access_token: String,
    expires_on: DateTime<Utc>,
}

/// Token cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a token for `(tenant, scope)` still valid at `now` plus the margin.
    pub fn lookup(&self, tenant: &str, scope: &str, now: DateTime<Utc>) -> Result<Option<AccessToken>> {
        let entries = self.read_entries()?;
        let Some(entry) = entries.get(&cache_key(tenant, scope)) else {
            return Ok(None);
        };

        let usable = entry
            .expires_on
            .checked_sub_signed(Duration::minutes(EXPIRY_MARGIN_MINUTES))
            .is_some_and(|cutoff| cutoff > now);
        if usable {
            debug!(tenant, scope, expires_on = %entry.expires_on, "using cached token");
            Ok(Some(AccessToken {
                token: entry.access_token.clone(),
                expires_on: entry.expires_on,
            }))
        } else {
            debug!(tenant, scope, "cached token expired or about to expire");
            Ok(None)
        }
    }

    /// Insert or replace the token for `(tenant, scope)`.
    pub fn store(&self, tenant: &str, scope: &str, token: &AccessToken) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(
            cache_key(tenant, scope),
            CacheEntry {
                access_token: token.token.clone(),
                expires_on: token.expires_on,
            },
        );

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EnrichError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| EnrichError::Serialization(e.to_string()))?;
        write_private(&self.path, json.as_bytes()).map_err(|e| EnrichError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "token cache updated");
        Ok(())
    }

    fn read_entries(&self) -> Result<BTreeMap<String, CacheEntry>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(EnrichError::io(&self.path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable token cache");
                Ok(BTreeMap::new())
            }
        }
    }
}

fn cache_key(tenant: &str, scope: &str) -> String {
    format!("{tenant}|{scope}")
}

/// Write `bytes` to a file readable only by the owner (on unix). An existing
/// file is truncated and re-restricted before anything is written.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)
}
