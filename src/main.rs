//! Jobs Harvester entry point
//!
//! ```bash
//! jobs-harvester [CONFIG_PATH]
//! HARVESTER__SEARCH__TITLE_QUERY="Data Analyst" jobs-harvester
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info};

use jobs_harvester_lib::infrastructure::config::default_config_path;
use jobs_harvester_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use jobs_harvester_lib::infrastructure::{
    ChromeSession, DatabaseConnection, HarvesterConfig, SqliteListingRepository,
};
use jobs_harvester_lib::CrawlOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(default_config_path, PathBuf::from);

    if !config_path.exists() {
        HarvesterConfig::default()
            .save(&config_path)
            .context("Failed to write default configuration")?;
    }
    let config = HarvesterConfig::load(Some(&config_path)).context("Failed to load configuration")?;

    init_logging_with_config(&config.logging)?;
    log_system_info();
    info!("📁 Config file: {:?}", config_path);

    let db = DatabaseConnection::with_max_connections(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    db.migrate().await?;
    let repository = SqliteListingRepository::new(db.pool().clone());

    let session = ChromeSession::launch(&config.browser)
        .await
        .context("Failed to launch browser")?;

    let mut orchestrator = CrawlOrchestrator::new(session, repository, &config);
    let result = orchestrator.run(&config.search_query()).await;
    let (session, repository) = orchestrator.into_parts();

    match &result {
        Ok(summary) => {
            info!(
                "Processed {} listings: {} new, {} already stored, {} failed",
                summary.processed,
                summary.inserted,
                summary.duplicates,
                summary.failed()
            );
            match repository.table_counts().await {
                Ok(counts) => info!(
                    companies = counts.companies,
                    job_listings = counts.job_listings,
                    job_descriptions = counts.job_descriptions,
                    jobs_companies = counts.jobs_companies,
                    "📊 Store totals"
                ),
                Err(e) => error!("Failed to read store totals: {}", e),
            }
        }
        Err(e) => error!("Crawl aborted: {}", e),
    }

    session.close().await;
    db.close().await;

    result?;
    Ok(())
}
