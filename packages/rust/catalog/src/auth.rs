//! Bearer credential strategies for the catalog service.
//!
//! Every strategy implements [`TokenProvider`], so the fetch logic never
//! knows how the token was obtained.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use metaenrich_shared::{AuthSettings, EnrichError, Result};

use crate::USER_AGENT;
use crate::token_cache::TokenCache;

/// Grant type for polling the device-code flow.
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra delay the server asks for on `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// An OAuth access token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

/// Anything able to hand out a bearer token for the catalog scope.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken>;
}

/// Build the provider selected in config.
pub fn provider_from_settings(auth: &AuthSettings) -> Result<Box<dyn TokenProvider>> {
    let provider: Box<dyn TokenProvider> = match auth {
        AuthSettings::ClientSecret {
            authority,
            tenant,
            client_id,
            client_secret,
            scope,
        } => Box::new(ClientSecretCredential::new(
            authority,
            tenant,
            client_id,
            client_secret,
            scope,
        )?),
        AuthSettings::Interactive {
            authority,
            tenant,
            client_id,
            scope,
            cache_path,
        } => Box::new(CachedCredential::new(
            TokenCache::new(cache_path),
            tenant,
            scope,
            Some(Box::new(DeviceCodeCredential::new(
                authority, tenant, client_id, scope,
            )?)),
        )),
        AuthSettings::CachedToken {
            tenant,
            scope,
            cache_path,
        } => Box::new(CachedCredential::new(
            TokenCache::new(cache_path),
            tenant,
            scope,
            None,
        )),
    };
    Ok(provider)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthError {
    fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{}: {desc}", self.error),
            None => self.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_poll_interval() -> u64 {
    5
}

fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| EnrichError::Network(format!("failed to build HTTP client: {e}")))
}

fn token_endpoint(authority: &str, tenant: &str) -> String {
    format!("{}/{tenant}/oauth2/v2.0/token", authority.trim_end_matches('/'))
}

fn into_access_token(resp: TokenResponse) -> Result<AccessToken> {
    let expires_on = TimeDelta::try_seconds(resp.expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| EnrichError::Auth(format!("invalid expires_in: {}", resp.expires_in)))?;
    Ok(AccessToken {
        token: resp.access_token,
        expires_on,
    })
}

// ---------------------------------------------------------------------------
// Client credentials
// ---------------------------------------------------------------------------

/// OAuth2 client-credentials grant (service principal).
pub struct ClientSecretCredential {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientSecretCredential {
    pub fn new(
        authority: &str,
        tenant: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            token_url: token_endpoint(authority, tenant),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
        })
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    #[instrument(skip_all, fields(client_id = %self.client_id))]
    async fn access_token(&self) -> Result<AccessToken> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EnrichError::Network(format!("{}: {e}", self.token_url)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<OAuthError>().await {
                Ok(err) => err.describe(),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(EnrichError::Auth(format!("client credential rejected: {detail}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::Auth(format!("invalid token response: {e}")))?;

        let token = into_access_token(token)?;
        info!("client credential token acquired");
        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// Device code (interactive browser login)
// ---------------------------------------------------------------------------

/// OAuth2 device-authorization grant: the user signs in from any browser
/// while the CLI polls the token endpoint.
pub struct DeviceCodeCredential {
    client: Client,
    device_code_url: String,
    token_url: String,
    client_id: String,
    scope: String,
}

impl DeviceCodeCredential {
    pub fn new(authority: &str, tenant: &str, client_id: &str, scope: &str) -> Result<Self> {
        let base = authority.trim_end_matches('/');
        Ok(Self {
            client: build_client()?,
            device_code_url: format!("{base}/{tenant}/oauth2/v2.0/devicecode"),
            token_url: token_endpoint(authority, tenant),
            client_id: client_id.to_string(),
            scope: scope.to_string(),
        })
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let response = self
            .client
            .post(&self.device_code_url)
            .form(&[("client_id", self.client_id.as_str()), ("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| EnrichError::Network(format!("{}: {e}", self.device_code_url)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<OAuthError>().await {
                Ok(err) => err.describe(),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(EnrichError::Auth(format!("device code request failed: {detail}")));
        }

        response
            .json()
            .await
            .map_err(|e| EnrichError::Auth(format!("invalid device code response: {e}")))
    }
}

#[async_trait]
impl TokenProvider for DeviceCodeCredential {
    #[instrument(skip_all, fields(client_id = %self.client_id))]
    async fn access_token(&self) -> Result<AccessToken> {
        let device = self.request_device_code().await?;

        let prompt = device.message.clone().unwrap_or_else(|| {
            format!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            )
        });
        eprintln!("{prompt}");
        info!(verification_uri = %device.verification_uri, "waiting for interactive login");

        let deadline = tokio::time::Instant::now()
            .checked_add(Duration::from_secs(device.expires_in))
            .ok_or_else(|| {
                EnrichError::Auth(format!("invalid device code expires_in: {}", device.expires_in))
            })?;
        let mut interval = Duration::from_secs(device.interval);

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(EnrichError::Auth("device code expired before login completed".into()));
            }
            tokio::time::sleep(interval).await;

            let response = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await
                .map_err(|e| EnrichError::Network(format!("{}: {e}", self.token_url)))?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| EnrichError::Auth(format!("invalid token response: {e}")))?;
                let token = into_access_token(token)?;
                info!("interactive login completed");
                return Ok(token);
            }

            let status = response.status();
            let err = response
                .json::<OAuthError>()
                .await
                .map_err(|_| EnrichError::Auth(format!("token polling failed: HTTP {status}")))?;

            match err.error.as_str() {
                "authorization_pending" => debug!("login still pending"),
                "slow_down" => interval += SLOW_DOWN_STEP,
                _ => return Err(EnrichError::Auth(format!("login failed: {}", err.describe()))),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Token cache wrapper
// ---------------------------------------------------------------------------

/// Serves tokens from the local cache; on a miss asks `inner` (if any) and
/// stores the fresh token.
pub struct CachedCredential {
    cache: TokenCache,
    tenant: String,
    scope: String,
    inner: Option<Box<dyn TokenProvider>>,
}

impl CachedCredential {
    pub fn new(
        cache: TokenCache,
        tenant: &str,
        scope: &str,
        inner: Option<Box<dyn TokenProvider>>,
    ) -> Self {
        Self {
            cache,
            tenant: tenant.to_string(),
            scope: scope.to_string(),
            inner,
        }
    }
}

#[async_trait]
impl TokenProvider for CachedCredential {
    async fn access_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.cache.lookup(&self.tenant, &self.scope, Utc::now())? {
            return Ok(token);
        }

        let Some(inner) = &self.inner else {
            return Err(EnrichError::Auth(format!(
                "no valid cached token for tenant '{}' in {}; sign in with auth = \"interactive\"",
                self.tenant,
                self.cache.path().display()
            )));
        };

        let token = inner.access_token().await?;
        self.cache.store(&self.tenant, &self.scope, &token)?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCOPE: &str = "https://purview.azure.net/.default";

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn access_token(&self) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: "fresh".into(),
                expires_on: Utc::now() + chrono::Duration::hours(1),
            })
        }
    }

    #[tokio::test]
    async fn client_secret_posts_form_and_parses_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "abc.def"
            })))
            .mount(&server)
            .await;

        let cred = ClientSecretCredential::new(&server.uri(), "tenant-1", "app", "pw", SCOPE).unwrap();
        let token = cred.access_token().await.unwrap();
        assert_eq!(token.token, "abc.def");
        assert!(token.expires_on > Utc::now() + chrono::Duration::minutes(50));
    }

    #[tokio::test]
    async fn client_secret_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "bad secret"
            })))
            .mount(&server)
            .await;

        let cred = ClientSecretCredential::new(&server.uri(), "tenant-1", "app", "pw", SCOPE).unwrap();
        let err = cred.access_token().await.unwrap_err();
        assert!(matches!(err, EnrichError::Auth(ref m) if m.contains("invalid_client")));
    }

    #[tokio::test]
    async fn out_of_range_expiry_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "x",
                "expires_in": i64::MAX
            })))
            .mount(&server)
            .await;

        let cred = ClientSecretCredential::new(&server.uri(), "tenant-1", "app", "pw", SCOPE).unwrap();
        let err = cred.access_token().await.unwrap_err();
        assert!(matches!(err, EnrichError::Auth(ref m) if m.contains("invalid expires_in")));
    }

    #[tokio::test]
    async fn out_of_range_device_code_lifetime_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-1",
                "user_code": "X",
                "verification_uri": "https://example.invalid",
                "expires_in": u64::MAX,
                "interval": 0
            })))
            .mount(&server)
            .await;

        let cred = DeviceCodeCredential::new(&server.uri(), "organizations", "public", SCOPE).unwrap();
        let err = cred.access_token().await.unwrap_err();
        assert!(matches!(err, EnrichError::Auth(ref m) if m.contains("expires_in")));
    }

    #[tokio::test]
    async fn device_code_polls_until_issued() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-1",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending"
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dev-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "user-token",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let cred = DeviceCodeCredential::new(&server.uri(), "organizations", "public", SCOPE).unwrap();
        let token = cred.access_token().await.unwrap();
        assert_eq!(token.token, "user-token");
    }

    #[tokio::test]
    async fn device_code_declined_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-1",
                "user_code": "X",
                "verification_uri": "https://example.invalid",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/organizations/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_declined"
            })))
            .mount(&server)
            .await;

        let cred = DeviceCodeCredential::new(&server.uri(), "organizations", "public", SCOPE).unwrap();
        let err = cred.access_token().await.unwrap_err();
        assert!(err.to_string().contains("authorization_declined"));
    }

    #[tokio::test]
    async fn cached_credential_calls_inner_once() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let cred = CachedCredential::new(
            TokenCache::new(tmp.path().join("cache.json")),
            "tenant",
            SCOPE,
            Some(Box::new(CountingProvider {
                calls: calls.clone(),
            })),
        );

        assert_eq!(cred.access_token().await.unwrap().token, "fresh");
        assert_eq!(cred.access_token().await.unwrap().token, "fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_only_without_token_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let cred = CachedCredential::new(
            TokenCache::new(tmp.path().join("cache.json")),
            "tenant",
            SCOPE,
            None,
        );
        let err = cred.access_token().await.unwrap_err();
        assert!(matches!(err, EnrichError::Auth(ref m) if m.contains("no valid cached token")));
    }
}
