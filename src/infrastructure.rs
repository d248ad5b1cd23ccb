//! Infrastructure layer for the browser, the database, configuration and logging
//!
//! Everything here talks to something outside the process. The crawl state
//! machines in `crate::crawling` only see the `RenderingSession` and
//! `ListingStore` traits.

pub mod chrome_session;
pub mod config;
pub mod database_connection;
pub mod listing_repository;
pub mod logging;
pub mod rendering;

// Re-export commonly used items
pub use chrome_session::ChromeSession;
pub use config::{ConfigError, DetailStrategy, HarvesterConfig};
pub use database_connection::DatabaseConnection;
pub use listing_repository::{
    ListingStore, PersistOutcome, PersistenceError, SqliteListingRepository, TableCounts,
};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use rendering::{RenderingError, RenderingResult, RenderingSession};
