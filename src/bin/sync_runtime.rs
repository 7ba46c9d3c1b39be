//! Sync Runtime - one-shot estimate rollup pass
//!
//! Fetches every page of the configured database, rolls subtask estimates up
//! into their parents, and patches back the totals that changed. All state is
//! rebuilt from the remote database on each invocation.
//!
//! Usage:
//!   cargo run --release --bin sync_runtime
//!
//! Environment variables:
//!   TOKEN             - Notion integration token (required)
//!   DB_ID             - target database id (required)
//!   LOG_FILE_PATH     - log destination file (default: stderr)
//!   ESTIMATE_PROPERTY - estimate number property name
//!   SUBTASK_PROPERTY  - subtask relation property name
//!   MAX_WRITERS       - concurrent update requests (default: 12)
//!   PAGE_PACING_MS    - delay between query pages (default: 100)
//!   RETRY_WAIT_MS     - wait before the rate-limit retry (default: 1000)

use dotenv::dotenv;
use log::{error, info};
use pointflow::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = Config::from_env();
    pointflow::init_logging(config.log_file_path.as_deref())?;

    info!("🚀 Starting estimate rollup sync");
    info!("   ├─ Database: {}", config.database_id);
    info!("   └─ Writers: {}", config.max_writers);

    match pointflow::run(&config).await {
        Ok(summary) => {
            info!(
                "✅ Sync complete: {} records fetched, {} updated, {} unchanged, {} failed",
                summary.fetched,
                summary.report.updated,
                summary.report.skipped,
                summary.report.failed
            );
            Ok(())
        }
        Err(e) => {
            error!("❌ Sync failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
