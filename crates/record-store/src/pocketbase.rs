//! PocketBase REST client implementing [`RecordStore`].

use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::{Fields, Filter, Record};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use urlencoding::encode;

/// Page size used when listing a whole collection.
const LIST_PAGE_SIZE: u32 = 500;

/// Metadata keys PocketBase adds to every record.
const META_KEYS: [&str; 4] = ["id", "collectionId", "collectionName", "expand"];

/// PocketBase record store client.
///
/// The admin token, if any, is kept in a `SecretString` so it never ends up
/// in debug output.
#[derive(Clone)]
pub struct PocketBaseStore {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    total_pages: u32,
}

impl PocketBaseStore {
    /// Create a new client for the PocketBase instance at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            token: token.map(SecretString::new),
        })
    }

    /// Check if the instance answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn records_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            encode(collection)
        )
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}", self.records_url(collection), encode(id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        Ok(self.authorize(request).send().await?)
    }

    /// Decode a successful record response, or map the failure.
    async fn handle_record(
        &self,
        response: Response,
        collection: &str,
        id: Option<&str>,
    ) -> Result<Record, StoreError> {
        if response.status().is_success() {
            let body: Value = response.json().await?;
            parse_record(body)
        } else {
            Err(self.extract_error(response, collection, id).await)
        }
    }

    /// Extract error information from a failed response.
    async fn extract_error(
        &self,
        response: Response,
        collection: &str,
        id: Option<&str>,
    ) -> StoreError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());

        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound {
                collection: collection.to_string(),
                id: id.unwrap_or_default().to_string(),
            },
            StatusCode::BAD_REQUEST if message.contains("validation_not_unique") => {
                warn!(collection, "Unique constraint rejected by PocketBase");
                StoreError::Conflict(format!("{}: {}", collection, message))
            }
            _ => {
                warn!(collection, status = %status, "PocketBase request failed");
                StoreError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

/// Split a PocketBase record body into id, version and fields.
fn parse_record(body: Value) -> Result<Record, StoreError> {
    let Value::Object(mut map) = body else {
        return Err(StoreError::Api {
            status: 200,
            message: "record body is not an object".into(),
        });
    };

    let id = map
        .get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| StoreError::Api {
            status: 200,
            message: "record body has no id".into(),
        })?;
    let version = map
        .get("updated")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    for key in META_KEYS {
        map.remove(key);
    }

    Ok(Record {
        id,
        version,
        fields: map,
    })
}

#[async_trait]
impl RecordStore for PocketBaseStore {
    fn host(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, fields), fields(host = %self.base_url))]
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        let response = self
            .send(self.client.post(self.records_url(collection)).json(&fields))
            .await?;
        let record = self.handle_record(response, collection, None).await?;
        debug!(id = %record.id, "Created record");
        Ok(record)
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn get(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        let response = self
            .send(self.client.get(self.record_url(collection, id)))
            .await?;
        self.handle_record(response, collection, Some(id)).await
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn find_first(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Record>, StoreError> {
        let request = self.client.get(self.records_url(collection)).query(&[
            ("filter", filter.to_expression()),
            ("perPage", "1".to_string()),
            ("skipTotal", "1".to_string()),
        ]);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response, collection, None).await);
        }

        let list: ListResponse = response.json().await?;
        list.items.into_iter().next().map(parse_record).transpose()
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self.client.get(self.records_url(collection)).query(&[
                ("page", page.to_string()),
                ("perPage", LIST_PAGE_SIZE.to_string()),
            ]);
            let response = self.send(request).await?;

            if !response.status().is_success() {
                return Err(self.extract_error(response, collection, None).await);
            }

            let list: ListResponse = response.json().await?;
            let empty = list.items.is_empty();
            for item in list.items {
                records.push(parse_record(item)?);
            }

            if empty || page >= list.total_pages {
                break;
            }
            debug!(collection, page, total_pages = list.total_pages, "Fetching next page");
            page += 1;
        }

        Ok(records)
    }

    #[instrument(skip(self, patch), fields(host = %self.base_url))]
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        let response = self
            .send(self.client.patch(self.record_url(collection, id)).json(&patch))
            .await?;
        self.handle_record(response, collection, Some(id)).await
    }

    /// PocketBase has no conditional update, so this re-reads the record
    /// and compares `updated` right before patching. The window between
    /// the read and the patch is narrow but not closed.
    ///
    /// `updated` has millisecond resolution: a write landing in the same
    /// millisecond as the one `expected_version` came from is not detected.
    #[instrument(skip(self, patch), fields(host = %self.base_url))]
    async fn update_if_version(
        &self,
        collection: &str,
        id: &str,
        expected_version: &str,
        patch: Fields,
    ) -> Result<Record, StoreError> {
        let current = self.get(collection, id).await?;
        if current.version != expected_version {
            debug!(
                expected = expected_version,
                found = %current.version,
                "Record changed since read"
            );
            return Err(StoreError::VersionConflict {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.update(collection, id, patch).await
    }

    #[instrument(skip(self), fields(host = %self.base_url))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .send(self.client.delete(self.record_url(collection, id)))
            .await?;

        if !response.status().is_success() {
            return Err(self.extract_error(response, collection, Some(id)).await);
        }

        debug!("Deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record_strips_metadata() {
        let body = json!({
            "id": "abc123def456ghi",
            "collectionId": "pbc_1",
            "collectionName": "client",
            "created": "2024-01-01 10:00:00.000Z",
            "updated": "2024-01-02 10:00:00.000Z",
            "name": "Acme HOA"
        });

        let record = parse_record(body).unwrap();
        assert_eq!(record.id, "abc123def456ghi");
        assert_eq!(record.version, "2024-01-02 10:00:00.000Z");
        assert_eq!(record.str_field("name"), Some("Acme HOA"));
        assert!(!record.fields.contains_key("collectionName"));
        assert!(!record.fields.contains_key("id"));
    }

    #[test]
    fn test_parse_record_without_id() {
        let result = parse_record(json!({"name": "x"}));
        assert!(matches!(result, Err(StoreError::Api { .. })));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let store =
            PocketBaseStore::new("http://localhost:8090/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(store.host(), "http://localhost:8090");
    }
}
