//! End-to-end crawl passes against a scripted session and an in-memory store.

use jobs_harvester_lib::CrawlOrchestrator;
use jobs_harvester_lib::infrastructure::config::DetailStrategy;
use jobs_harvester_lib::infrastructure::{SqliteListingRepository, TableCounts};
use jobs_harvester_lib::test_utils::{FakeListing, FakeSession, TestDatabase, test_config};

async fn harvest(
    db: &TestDatabase,
    session: FakeSession,
    strategy: DetailStrategy,
) -> (jobs_harvester_lib::CrawlSummary, FakeSession, SqliteListingRepository) {
    let mut config = test_config();
    config.crawling.detail_strategy = strategy;

    let mut orchestrator = CrawlOrchestrator::new(session, db.repository(), &config);
    let summary = orchestrator.harvest().await;
    let (session, repository) = orchestrator.into_parts();
    (summary, session, repository)
}

#[tokio::test]
async fn two_listings_from_one_company() {
    let db = TestDatabase::new().await.unwrap();
    let session = FakeSession::with_listings(vec![
        FakeListing::new("Acme", "Engineer", "desc A"),
        FakeListing::new("Acme", "Analyst", "desc B"),
    ]);

    let (summary, _, repository) = harvest(&db, session, DetailStrategy::Inline).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(
        repository.table_counts().await.unwrap(),
        TableCounts {
            companies: 1,
            job_listings: 2,
            job_descriptions: 2,
            jobs_companies: 2,
        }
    );
    assert!(repository.find_listing("Analyst", "desc B").await.unwrap().is_some());
}

#[tokio::test]
async fn repeated_listing_is_stored_once() {
    let db = TestDatabase::new().await.unwrap();
    let session = FakeSession::with_listings(vec![
        FakeListing::new("Acme", "Engineer", "desc A"),
        FakeListing::new("Acme", "Engineer", "desc A"),
    ]);

    let (summary, _, repository) = harvest(&db, session, DetailStrategy::Inline).await;

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.duplicates, 1);
    let counts = repository.table_counts().await.unwrap();
    assert_eq!(counts.job_listings, 1);
    assert_eq!(counts.job_descriptions, 1);
}

#[tokio::test]
async fn failed_listing_does_not_stop_the_pass() {
    let db = TestDatabase::new().await.unwrap();
    let session = FakeSession::with_listings(vec![
        FakeListing::new("Acme", "Engineer", "desc A"),
        FakeListing::new("Initech", "Analyst", "desc B").failing(5),
        FakeListing::new("Globex", "Designer", "desc C"),
    ]);

    let (summary, _, repository) = harvest(&db, session, DetailStrategy::Inline).await;

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.extraction_failed, 1);
    assert_eq!(summary.inserted, 2);
    assert!(repository.find_listing("Designer", "desc C").await.unwrap().is_some());
    assert!(repository.find_company("Initech").await.unwrap().is_none());
}

#[tokio::test]
async fn second_run_only_adds_new_listings() {
    let db = TestDatabase::new().await.unwrap();
    let first = FakeSession::with_listings(vec![FakeListing::new("Acme", "Engineer", "desc A")]);
    harvest(&db, first, DetailStrategy::Inline).await;

    let second = FakeSession::with_listings(vec![
        FakeListing::new("Acme", "Engineer", "desc A"),
        FakeListing::new("Acme", "Engineer", "desc A, updated"),
    ]);
    let (summary, _, repository) = harvest(&db, second, DetailStrategy::Inline).await;

    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.inserted, 1);
    let counts = repository.table_counts().await.unwrap();
    assert_eq!(counts.companies, 1);
    assert_eq!(counts.job_listings, 2);
}

#[tokio::test]
async fn paginated_results_are_all_harvested() {
    let db = TestDatabase::new().await.unwrap();
    let session = FakeSession::with_pages(vec![
        vec![FakeListing::new("Acme", "Engineer", "desc A")],
        vec![FakeListing::new("Globex", "Analyst", "desc B")],
        vec![FakeListing::new("Initech", "Designer", "desc C")],
    ]);

    let (summary, session, repository) = harvest(&db, session, DetailStrategy::Inline).await;

    assert_eq!(summary.pages_loaded, 3);
    assert_eq!(summary.inserted, 3);
    assert_eq!(session.visible_listings(), 3);
    assert_eq!(repository.table_counts().await.unwrap().companies, 3);
}

#[tokio::test]
async fn navigate_strategy_reads_detail_pages() {
    let db = TestDatabase::new().await.unwrap();
    let listings = vec![
        FakeListing::new("Acme", "Engineer", "desc A"),
        FakeListing::new("Acme", "Analyst", "desc B").failing_detail(1),
    ];
    let detail_urls: Vec<String> = listings.iter().map(|l| l.detail_url.clone()).collect();
    let session = FakeSession::with_listings(listings);

    let (summary, session, repository) = harvest(&db, session, DetailStrategy::Navigate).await;

    assert_eq!(summary.inserted, 2);
    assert_eq!(session.calls.click, 0);
    assert_eq!(session.visited, vec![detail_urls[0].clone(), detail_urls[1].clone(), detail_urls[1].clone()]);
    assert!(repository.find_listing("Engineer", "desc A").await.unwrap().is_some());
    assert!(repository.find_listing("Analyst", "desc B").await.unwrap().is_some());
}
