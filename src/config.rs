//! Configuration loaded from environment variables

use std::env;

/// Runtime configuration for one sync pass.
///
/// Environment variables:
/// - `TOKEN` (required) - Notion integration token
/// - `DB_ID` (required) - target database id
/// - `LOG_FILE_PATH` - log destination; stderr when unset
/// - `ESTIMATE_PROPERTY` (default: 見積りポイント)
/// - `SUBTASK_PROPERTY` (default: サブタスク)
/// - `NOTION_BASE_URL` (default: https://api.notion.com)
/// - `MAX_WRITERS` (default: 12) - concurrent update requests
/// - `PAGE_PACING_MS` (default: 100) - delay between query pages
/// - `RETRY_WAIT_MS` (default: 1000) - wait before the rate-limit retry
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub database_id: String,
    pub log_file_path: Option<String>,
    pub estimate_property: String,
    pub relation_property: String,
    pub base_url: String,
    pub max_writers: usize,
    pub page_pacing_ms: u64,
    pub retry_wait_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let token = env::var("TOKEN").expect("TOKEN must be set in .env file");
        let database_id = env::var("DB_ID").expect("DB_ID must be set in .env file");

        let log_file_path = env::var("LOG_FILE_PATH").ok();

        let estimate_property =
            env::var("ESTIMATE_PROPERTY").unwrap_or_else(|_| "見積りポイント".to_string());
        let relation_property =
            env::var("SUBTASK_PROPERTY").unwrap_or_else(|_| "サブタスク".to_string());

        let base_url =
            env::var("NOTION_BASE_URL").unwrap_or_else(|_| "https://api.notion.com".to_string());

        let max_writers = env::var("MAX_WRITERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(12);

        let page_pacing_ms = env::var("PAGE_PACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let retry_wait_ms = env::var("RETRY_WAIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        Self {
            token,
            database_id,
            log_file_path,
            estimate_property,
            relation_property,
            base_url,
            max_writers,
            page_pacing_ms,
            retry_wait_ms,
        }
    }
}
