//! Notion API Integration
//!
//! Implements `RecordStore` against the Notion REST API:
//! - Database query endpoint (paginated): POST /v1/databases/{id}/query
//! - Page patch endpoint: PATCH /v1/pages/{id}
//!
//! ## API Reference
//!
//! Both endpoints authenticate with a bearer token and a pinned
//! `Notion-Version` header. The query response carries `has_more` /
//! `next_cursor` for pagination; a 429 status signals rate limiting.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::record::Record;
use crate::record_store::{RecordPage, RecordStore, RemoteError};

const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Query response envelope (page objects stay dynamic - the property names
/// we need to read are configuration, not compile-time knowledge).
#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    database_id: String,
    estimate_property: String,
    relation_property: String,
}

impl NotionClient {
    pub fn new(
        base_url: &str,
        token: &str,
        database_id: &str,
        estimate_property: &str,
        relation_property: &str,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
            estimate_property: estimate_property.to_string(),
            relation_property: relation_property.to_string(),
        }
    }

    /// Reduce one page object to a `Record`.
    ///
    /// Missing or null `number` maps to `None`; a missing relation property
    /// maps to no children. Only a missing `id` is unusable.
    fn parse_page(&self, page: &Value) -> Result<Record, RemoteError> {
        let id = page["id"]
            .as_str()
            .ok_or_else(|| RemoteError::InvalidResponse("page object without id".to_string()))?
            .to_string();

        let estimate = page["properties"][&self.estimate_property]["number"].as_f64();

        let child_ids = page["properties"][&self.relation_property]["relation"]
            .as_array()
            .map(|relations| {
                relations
                    .iter()
                    .filter_map(|r| r["id"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Record {
            id,
            estimate,
            child_ids,
        })
    }
}

#[async_trait]
impl RecordStore for NotionClient {
    async fn query_page(&self, cursor: Option<&str>) -> Result<RecordPage, RemoteError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);

        let mut payload = json!({});
        if let Some(cursor) = cursor {
            payload["start_cursor"] = json!(cursor);
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(RemoteError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: QueryResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        let records = data
            .results
            .iter()
            .map(|page| self.parse_page(page))
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = if data.has_more { data.next_cursor } else { None };

        Ok(RecordPage {
            records,
            next_cursor,
        })
    }

    async fn update_estimate(&self, record_id: &str, total: f64) -> Result<(), RemoteError> {
        let url = format!("{}/v1/pages/{}", self.base_url, record_id);

        let payload = json!({
            "properties": {
                &self.estimate_property: { "number": total }
            }
        });

        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(RemoteError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
