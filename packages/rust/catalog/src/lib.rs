//! Catalog fetch: authenticate, pull an entity (plus lineage and attached
//! schema), and flatten it into a [`CatalogRecord`].
//!
//! This crate provides:
//! - [`auth`]: interchangeable [`TokenProvider`] strategies and their cache
//! - [`client`]: the Atlas v2 HTTP calls
//! - [`flatten`]: JSON → YAML-safe record reshaping

pub mod auth;
pub mod client;
pub mod flatten;
pub mod token_cache;

use tracing::{info, instrument, warn};

use metaenrich_shared::{CatalogRecord, CatalogSettings, Identifier, Result};

pub use auth::{
    AccessToken, CachedCredential, ClientSecretCredential, DeviceCodeCredential, TokenProvider,
    provider_from_settings,
};
pub use client::CatalogClient;
pub use token_cache::TokenCache;

/// User-Agent string for catalog and identity requests.
pub(crate) const USER_AGENT: &str = concat!("metaenrich/", env!("CARGO_PKG_VERSION"));

/// Fetch and flatten the catalog record for `id`.
///
/// 1. Obtain a bearer token from `provider`
/// 2. Read the entity
/// 3. Read its lineage (when enabled)
/// 4. For resource sets, read the attached schema entity
#[instrument(skip_all, fields(id = %id, endpoint = %settings.endpoint))]
pub async fn fetch_catalog_record(
    settings: &CatalogSettings,
    provider: &dyn TokenProvider,
    id: &Identifier,
) -> Result<CatalogRecord> {
    let token = provider.access_token().await?;
    let client = CatalogClient::new(&settings.endpoint, &token)?;

    let entity = client.entity(id.as_str()).await?;
    info!(type_name = flatten::type_name(&entity).unwrap_or("unknown"), "entity fetched");

    let lineage = if settings.include_lineage {
        Some(client.lineage(id.as_str(), settings.lineage_depth).await?)
    } else {
        None
    };

    let attached = if flatten::is_resource_set(&entity) {
        match flatten::attached_schema_guid(&entity) {
            Some(schema_guid) => {
                let schema = client.entity(&schema_guid).await?;
                info!(%schema_guid, "attached schema fetched");
                Some(flatten::attached_schema(&schema_guid, &schema))
            }
            None => {
                warn!("resource set has no attached schema reference");
                None
            }
        }
    } else {
        None
    };

    let record = flatten::build_record(id, &entity, lineage.as_ref(), attached);
    info!(columns = record.columns.len(), "catalog record built");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use metaenrich_shared::{AuthSettings, EnrichError};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn access_token(&self) -> Result<AccessToken> {
            Ok(AccessToken {
                token: "test-token".into(),
                expires_on: Utc::now() + chrono::Duration::hours(1),
            })
        }
    }

    fn settings(endpoint: &str, include_lineage: bool) -> CatalogSettings {
        CatalogSettings {
            endpoint: endpoint.to_string(),
            auth: AuthSettings::CachedToken {
                tenant: "t".into(),
                scope: "s".into(),
                cache_path: "/unused".into(),
            },
            include_lineage,
            lineage_depth: 3,
        }
    }

    fn table_entity() -> serde_json::Value {
        json!({
            "entity": {
                "typeName": "azure_sql_table",
                "attributes": {"qualifiedName": "mssql://srv/db/dbo/orders", "name": "orders", "description": "Order facts"}
            },
            "referredEntities": {
                "col-1": {"typeName": "column", "attributes": {"name": "order_id"}}
            }
        })
    }

    #[tokio::test]
    async fn fetches_entity_and_lineage() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/entity/guid/abc-123"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(table_entity()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/lineage/abc-123"))
            .and(query_param("depth", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "baseEntityGuid": "abc-123",
                "relations": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = Identifier::parse("abc-123").unwrap();
        let record = fetch_catalog_record(&settings(&server.uri(), true), &StaticToken, &id)
            .await
            .unwrap();

        assert_eq!(record.name.as_deref(), Some("orders"));
        assert_eq!(record.description.as_deref(), Some("Order facts"));
        assert_eq!(record.columns.len(), 1);
        assert!(record.lineage.is_some());
        assert!(record.attached_schema.is_none());
    }

    #[tokio::test]
    async fn lineage_can_be_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/entity/guid/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(table_entity()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/lineage/abc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let id = Identifier::parse("abc-123").unwrap();
        let record = fetch_catalog_record(&settings(&server.uri(), false), &StaticToken, &id)
            .await
            .unwrap();
        assert!(record.lineage.is_none());
    }

    #[tokio::test]
    async fn resource_set_merges_attached_schema() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/entity/guid/rs-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity": {
                    "typeName": "azure_datalake_gen2_resource_set",
                    "attributes": {"name": "events/{N}.parquet", "qualifiedName": "https://lake/events/{N}.parquet"},
                    "relationshipAttributes": {"attachedSchema": [{"guid": "schema-9"}]}
                },
                "referredEntities": {}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/entity/guid/schema-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity": {"typeName": "tabular_schema", "attributes": {"name": "events_schema"}},
                "referredEntities": {
                    "c-1": {"typeName": "column", "attributes": {"name": "event_id", "type": "string"}},
                    "c-2": {"typeName": "column", "attributes": {"name": "ts", "type": "timestamp"}}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = Identifier::parse("rs-1").unwrap();
        let record = fetch_catalog_record(&settings(&server.uri(), false), &StaticToken, &id)
            .await
            .unwrap();

        let schema = record.attached_schema.expect("attached schema");
        assert_eq!(schema.guid, "schema-9");
        assert_eq!(schema.name.as_deref(), Some("events_schema"));
        assert_eq!(schema.columns.len(), 2);
    }

    #[tokio::test]
    async fn non_success_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog/api/atlas/v2/entity/guid/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{\"errorCode\":\"ATLAS-404-00-005\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let id = Identifier::parse("missing").unwrap();
        let err = fetch_catalog_record(&settings(&server.uri(), true), &StaticToken, &id)
            .await
            .unwrap_err();

        match err {
            EnrichError::Catalog(msg) => {
                assert!(msg.contains("404"));
                assert!(msg.contains("ATLAS-404"));
            }
            other => panic!("expected Catalog error, got {other:?}"),
        }
    }
}
