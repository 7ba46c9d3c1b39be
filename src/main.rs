pub mod config;
pub mod fetcher;
pub mod notion;
pub mod record;
pub mod record_store;
pub mod rollup;
pub mod syncer;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use notion::NotionClient;
use record_store::{RecordStore, RemoteError};
use rollup::RollupError;
use syncer::SyncReport;

/// What one sync pass did, for the completion log.
#[derive(Debug)]
pub struct RunSummary {
    pub fetched: usize,
    pub report: SyncReport,
}

#[derive(Debug)]
pub enum RunError {
    Remote(RemoteError),
    Rollup(RollupError),
}

impl From<RemoteError> for RunError {
    fn from(err: RemoteError) -> Self {
        RunError::Remote(err)
    }
}

impl From<RollupError> for RunError {
    fn from(err: RollupError) -> Self {
        RunError::Rollup(err)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Remote(e) => write!(f, "{}", e),
            RunError::Rollup(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RunError {}

/// Tuning knobs for `sync_database`, split out so tests can drive the full
/// pipeline against a mock store without a `Config`.
#[derive(Debug, Clone, Copy)]
pub struct SyncTuning {
    pub page_pacing: Duration,
    pub max_writers: usize,
    pub retry_wait: Duration,
}

impl From<&Config> for SyncTuning {
    fn from(config: &Config) -> Self {
        Self {
            page_pacing: Duration::from_millis(config.page_pacing_ms),
            max_writers: config.max_writers,
            retry_wait: Duration::from_millis(config.retry_wait_ms),
        }
    }
}

/// Run one full sync pass against `store`: fetch everything, index, compute
/// rollups, write back changed totals. Stages run strictly in sequence; each
/// consumes the previous stage's complete output.
pub async fn sync_database(
    store: Arc<dyn RecordStore>,
    tuning: SyncTuning,
) -> Result<RunSummary, RunError> {
    let records = fetcher::fetch_all(store.as_ref(), tuning.page_pacing).await?;
    log::info!("Fetched {} records", records.len());

    let index = record::build_index(&records);

    let cache = rollup::compute_rollups(&records, &index)?;
    log::info!(
        "Computed {} rollup totals ({} evaluated, {} memo hits)",
        cache.len(),
        cache.evaluations,
        cache.memo_hits
    );

    let report = syncer::sync_estimates(
        store,
        &records,
        &cache,
        tuning.max_writers,
        tuning.retry_wait,
    )
    .await;

    Ok(RunSummary {
        fetched: records.len(),
        report,
    })
}

/// Initialize process-wide logging.
///
/// Logs go to `log_file_path` in append mode when configured, otherwise to
/// stderr. Default filter is `info`; `RUST_LOG` overrides it.
pub fn init_logging(log_file_path: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    match log_file_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.try_init()?;
    Ok(())
}

/// Production entry: build the Notion client from `config` and sync.
pub async fn run(config: &Config) -> Result<RunSummary, RunError> {
    let client = Arc::new(NotionClient::new(
        &config.base_url,
        &config.token,
        &config.database_id,
        &config.estimate_property,
        &config.relation_property,
    ));

    sync_database(client, SyncTuning::from(config)).await
}
