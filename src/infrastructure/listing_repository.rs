//! Idempotent listing persistence
//!
//! Each record is written in its own transaction:
//! 1. company looked up by exact name, inserted when absent
//! 2. (title, description) checked against existing listings
//! 3. listing, company link and description inserted together
//!
//! The check-then-insert sequence assumes a single writer.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Company, JobListing, ListingRecord};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error while {step}: {source}")]
    Database {
        step: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl PersistenceError {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Database { step, .. } => step,
        }
    }
}

fn at(step: &'static str) -> impl FnOnce(sqlx::Error) -> PersistenceError {
    move |source| PersistenceError::Database { step, source }
}

/// What `persist` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted {
        job_id: i64,
        company_id: i64,
        company_created: bool,
    },
    AlreadyPresent {
        job_id: i64,
        company_id: i64,
    },
}

impl PersistOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted { .. })
    }

    pub fn job_id(&self) -> i64 {
        match self {
            Self::Inserted { job_id, .. } | Self::AlreadyPresent { job_id, .. } => *job_id,
        }
    }
}

/// Row counts of the four listing tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub companies: i64,
    pub job_listings: i64,
    pub job_descriptions: i64,
    pub jobs_companies: i64,
}

/// Sink for extracted records.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn persist(&self, record: &ListingRecord) -> Result<PersistOutcome, PersistenceError>;
}

pub struct SqliteListingRepository {
    pool: SqlitePool,
}

impl SqliteListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_company(&self, name: &str) -> Result<Option<Company>, PersistenceError> {
        sqlx::query_as::<_, Company>("SELECT id, name FROM companies WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(at("looking up company"))
    }

    pub async fn find_listing(
        &self,
        title: &str,
        description: &str,
    ) -> Result<Option<JobListing>, PersistenceError> {
        sqlx::query_as::<_, JobListing>(
            r"
            SELECT jl.id, jl.title
            FROM job_listings jl
            JOIN jobs_descriptions jd ON jd.job_id = jl.id
            WHERE jl.title = ? AND jd.description = ?
            LIMIT 1
            ",
        )
        .bind(title)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(at("looking up listing"))
    }

    pub async fn table_counts(&self) -> Result<TableCounts, PersistenceError> {
        Ok(TableCounts {
            companies: self.count("companies").await?,
            job_listings: self.count("job_listings").await?,
            job_descriptions: self.count("jobs_descriptions").await?,
            jobs_companies: self.count("jobs_companies").await?,
        })
    }

    async fn count(&self, table: &'static str) -> Result<i64, PersistenceError> {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(at("counting rows"))
    }

    /// Returns the company id and whether it was created by this call.
    async fn ensure_company(
        tx: &mut Transaction<'_, Sqlite>,
        name: &str,
    ) -> Result<(i64, bool), PersistenceError> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM companies WHERE name = ? LIMIT 1")
            .bind(name)
            .fetch_optional(&mut **tx)
            .await
            .map_err(at("looking up company"))?;

        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = sqlx::query_scalar::<_, i64>("INSERT INTO companies (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(at("inserting company"))?;
        Ok((id, true))
    }

    async fn existing_listing(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ListingRecord,
    ) -> Result<Option<i64>, PersistenceError> {
        sqlx::query_scalar::<_, i64>(
            r"
            SELECT jl.id
            FROM job_listings jl
            JOIN jobs_descriptions jd ON jd.job_id = jl.id
            WHERE jl.title = ? AND jd.description = ?
            LIMIT 1
            ",
        )
        .bind(&record.title)
        .bind(&record.description)
        .fetch_optional(&mut **tx)
        .await
        .map_err(at("checking for existing listing"))
    }

    async fn insert_listing(
        tx: &mut Transaction<'_, Sqlite>,
        record: &ListingRecord,
        company_id: i64,
    ) -> Result<i64, PersistenceError> {
        let job_id = sqlx::query_scalar::<_, i64>("INSERT INTO job_listings (title) VALUES (?) RETURNING id")
            .bind(&record.title)
            .fetch_one(&mut **tx)
            .await
            .map_err(at("inserting listing"))?;

        sqlx::query("INSERT INTO jobs_companies (job_id, company_id) VALUES (?, ?)")
            .bind(job_id)
            .bind(company_id)
            .execute(&mut **tx)
            .await
            .map_err(at("linking listing to company"))?;

        sqlx::query("INSERT INTO jobs_descriptions (job_id, description) VALUES (?, ?)")
            .bind(job_id)
            .bind(&record.description)
            .execute(&mut **tx)
            .await
            .map_err(at("inserting description"))?;

        Ok(job_id)
    }
}

#[async_trait]
impl ListingStore for SqliteListingRepository {
    async fn persist(&self, record: &ListingRecord) -> Result<PersistOutcome, PersistenceError> {
        // Dropping `tx` on any early return rolls the whole record back.
        let mut tx = self.pool.begin().await.map_err(at("beginning transaction"))?;

        let (company_id, company_created) = Self::ensure_company(&mut tx, &record.company_name).await?;

        let outcome = match Self::existing_listing(&mut tx, record).await? {
            Some(job_id) => PersistOutcome::AlreadyPresent { job_id, company_id },
            None => {
                let job_id = Self::insert_listing(&mut tx, record, company_id).await?;
                PersistOutcome::Inserted {
                    job_id,
                    company_id,
                    company_created,
                }
            }
        };

        tx.commit().await.map_err(at("committing transaction"))?;

        debug!(
            title = %record.title,
            company = %record.company_name,
            ?outcome,
            "Persisted listing"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDatabase;

    fn record(company: &str, title: &str, description: &str) -> ListingRecord {
        ListingRecord {
            company_name: company.to_string(),
            location: "New York, NY".to_string(),
            title: title.to_string(),
            posted_date: "Today".to_string(),
            detail_url: "https://jobs.example.com/1".to_string(),
            description: description.to_string(),
        }
    }

    async fn repository() -> (TestDatabase, SqliteListingRepository) {
        let db = TestDatabase::new().await.unwrap();
        let repo = SqliteListingRepository::new(db.pool().clone());
        (db, repo)
    }

    #[tokio::test]
    async fn persist_inserts_all_four_rows() {
        let (_db, repo) = repository().await;

        let outcome = repo.persist(&record("Acme", "Engineer", "desc A")).await.unwrap();

        assert!(matches!(
            outcome,
            PersistOutcome::Inserted {
                company_created: true,
                ..
            }
        ));
        assert_eq!(
            repo.table_counts().await.unwrap(),
            TableCounts {
                companies: 1,
                job_listings: 1,
                job_descriptions: 1,
                jobs_companies: 1,
            }
        );
    }

    #[tokio::test]
    async fn persist_is_idempotent() {
        let (_db, repo) = repository().await;
        let acme = record("Acme", "Engineer", "desc A");

        let first = repo.persist(&acme).await.unwrap();
        let second = repo.persist(&acme).await.unwrap();

        assert!(first.is_inserted());
        assert_eq!(
            second,
            PersistOutcome::AlreadyPresent {
                job_id: first.job_id(),
                company_id: repo.find_company("Acme").await.unwrap().unwrap().id,
            }
        );
        let counts = repo.table_counts().await.unwrap();
        assert_eq!(counts.job_listings, 1);
        assert_eq!(counts.job_descriptions, 1);
        assert_eq!(counts.jobs_companies, 1);
    }

    #[tokio::test]
    async fn existing_company_is_reused() {
        let (_db, repo) = repository().await;

        let first = repo.persist(&record("Acme", "Engineer", "desc A")).await.unwrap();
        let second = repo.persist(&record("Acme", "Analyst", "desc B")).await.unwrap();

        let (PersistOutcome::Inserted { company_id: a, .. }, PersistOutcome::Inserted { company_id: b, company_created, .. }) =
            (first, second)
        else {
            panic!("both records should be inserted");
        };
        assert_eq!(a, b);
        assert!(!company_created);
        assert_eq!(repo.table_counts().await.unwrap().companies, 1);
    }

    #[tokio::test]
    async fn same_title_with_new_description_is_a_new_listing() {
        let (_db, repo) = repository().await;

        let first = repo.persist(&record("Acme", "Engineer", "desc A")).await.unwrap();
        let second = repo.persist(&record("Acme", "Engineer", "desc A, revised")).await.unwrap();

        assert!(second.is_inserted());
        assert_ne!(first.job_id(), second.job_id());
        assert_eq!(repo.table_counts().await.unwrap().job_listings, 2);
        assert!(repo.find_listing("Engineer", "desc A, revised").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_description_insert_rolls_back_the_record() {
        let (db, repo) = repository().await;
        sqlx::query(
            r"
            CREATE TRIGGER reject_descriptions BEFORE INSERT ON jobs_descriptions
            BEGIN
                SELECT RAISE(ABORT, 'description rejected');
            END
            ",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = repo.persist(&record("Acme", "Engineer", "desc A")).await.unwrap_err();

        assert_eq!(err.step(), "inserting description");
        assert_eq!(repo.table_counts().await.unwrap(), TableCounts::default());
        assert!(repo.find_company("Acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_listing_misses_on_unknown_pair() {
        let (_db, repo) = repository().await;
        repo.persist(&record("Acme", "Engineer", "desc A")).await.unwrap();

        assert!(repo.find_listing("Engineer", "desc B").await.unwrap().is_none());
        assert!(repo.find_listing("Analyst", "desc A").await.unwrap().is_none());
    }
}
