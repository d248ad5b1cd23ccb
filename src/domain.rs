//! Domain module - listing records and search parameters
//!
//! Plain data types shared by the crawling pipeline and the persistence layer.
//! Nothing in here talks to the browser or the database.

pub mod listing;
pub mod search;

pub use listing::{Company, JobCompanyLink, JobDescription, JobListing, ListingRecord, ListingSummary};
pub use search::{SearchQuery, build_search_url};
