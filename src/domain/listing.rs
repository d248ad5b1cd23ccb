//! Listing entities
//!
//! `ListingRecord` is the ephemeral value produced by extraction and consumed
//! once by persistence. The remaining types mirror the normalized schema rows.

use serde::{Deserialize, Serialize};

/// One fully extracted listing, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub company_name: String,
    pub location: String,
    pub title: String,
    pub posted_date: String,
    pub detail_url: String,
    pub description: String,
}

/// Listing fields read from the result card, before the detail text is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub company_name: String,
    pub location: String,
    pub title: String,
    pub posted_date: String,
    pub detail_url: String,
}

impl ListingSummary {
    /// Completes the summary with its detail text.
    pub fn with_description(self, description: String) -> ListingRecord {
        ListingRecord {
            company_name: self.company_name,
            location: self.location,
            title: self.title,
            posted_date: self.posted_date,
            detail_url: self.detail_url,
            description,
        }
    }
}

/// `companies` row. Identity key is the exact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

/// `job_listings` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobListing {
    pub id: i64,
    pub title: String,
}

/// `jobs_descriptions` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobDescription {
    pub job_id: i64,
    pub description: String,
}

/// `jobs_companies` join row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobCompanyLink {
    pub job_id: i64,
    pub company_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_completes_into_record() {
        let summary = ListingSummary {
            company_name: "Acme".to_string(),
            location: "Austin, TX".to_string(),
            title: "Engineer".to_string(),
            posted_date: "2 days ago".to_string(),
            detail_url: "https://jobs.example.com/1".to_string(),
        };

        let record = summary.with_description("desc A".to_string());

        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.title, "Engineer");
        assert_eq!(record.description, "desc A");
        assert_eq!(record.detail_url, "https://jobs.example.com/1");
    }
}
