//! Integration tests for the import flow
//!
//! These tests wire the orchestrator against a scripted in-memory catalog
//! and a real SQLite content store, verifying:
//! - The complete four-phase run with counters and audit records
//! - Stop/resume across ticks without losing or repeating work
//! - Per-item failure isolation
//! - Idempotent upserts and change detection
//! - Reconciliation set algebra with remediation
//! - The media pipeline including URL-based de-duplication

use async_trait::async_trait;
use bridge_traits::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, KvStore, MemoryKvStore, RecordMapper,
    ScheduledJob, Scheduler,
};
use bytes::Bytes;
use catalog_client::{
    ApiCredentials, ClientConfig, ConnectionValidator, QueryClient, VehicleMapper,
};
use content_store::{
    create_test_pool, ContentRepository, ContentStatus, HistoryQuery, HistoryStatus, HistoryStore,
    ItemAction, ItemLogQuery, ItemLogStore, NewContent, SqliteContentRepository,
    SqliteHistoryStore, SqliteItemLogStore,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_engine::{
    ImportOrchestrator, ItemProcessor, ListingQueue, MediaQueue, MediaTickOutcome, MediaWorker,
    ProcessAction, ProgressTracker, ReconciliationEngine, RunStatus, SyncConfig, SyncError,
    TickOutcome,
};

// ============================================================================
// Scripted catalog
// ============================================================================

/// In-memory catalog serving the GraphQL shapes the engine expects, plus
/// image bytes for GET requests from the media worker.
struct MockCatalog {
    listings: Mutex<Vec<Value>>,
    /// Ids served as `listing: null` (absent remotely).
    missing: Mutex<HashSet<String>>,
    /// When set, every POST answers HTTP 503.
    hard_down: AtomicBool,
}

impl MockCatalog {
    fn new(listings: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            listings: Mutex::new(listings),
            missing: Mutex::new(HashSet::new()),
            hard_down: AtomicBool::new(false),
        })
    }

    fn mark_missing(&self, id: &str) {
        self.missing.lock().unwrap().insert(id.to_string());
    }

    fn set_listing_price(&self, id: &str, price: f64) {
        let mut listings = self.listings.lock().unwrap();
        for listing in listings.iter_mut() {
            if listing["id"] == json!(id) {
                listing["details"]["prices"]["public"]["amountInEUR"]["raw"] = json!(price);
            }
        }
    }

    fn ok(body: Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }

    fn extract_u64(query: &str, key: &str) -> u64 {
        let start = query.find(key).expect("key present in query") + key.len();
        query[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap()
    }

    fn extract_guid(query: &str) -> String {
        let start = query.find("guid: \"").expect("guid in query") + "guid: \"".len();
        query[start..].chars().take_while(|c| *c != '"').collect()
    }
}

#[async_trait]
impl HttpClient for MockCatalog {
    async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
        // Media fetches arrive as plain GETs.
        if request.method == HttpMethod::Get {
            return Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"image-bytes"),
            });
        }

        if self.hard_down.load(Ordering::SeqCst) {
            return Ok(HttpResponse {
                status: 503,
                headers: HashMap::new(),
                body: Bytes::from_static(b"down"),
            });
        }

        let body: Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        let query = body["query"].as_str().unwrap_or_default().to_string();
        let listings = self.listings.lock().unwrap().clone();

        if query.contains("TotalListings") || query.contains("__typename") {
            return Ok(Self::ok(json!({
                "data": {
                    "listings": {
                        "metadata": {
                            "totalItems": listings.len(),
                            "totalPages": listings.len().div_ceil(50),
                            "pageSize": 50,
                            "currentPage": 1
                        }
                    }
                }
            })));
        }

        if query.contains("ListingIds") {
            let page = Self::extract_u64(&query, "page: ") as usize;
            let size = Self::extract_u64(&query, "size: ") as usize;
            let start = (page - 1) * size;
            let slice: Vec<Value> = listings
                .iter()
                .skip(start)
                .take(size)
                .map(|listing| {
                    json!({
                        "id": listing["id"],
                        "details": { "publication": listing["details"]["publication"].clone() }
                    })
                })
                .collect();

            return Ok(Self::ok(json!({
                "data": {
                    "search": {
                        "listings": {
                            "listings": slice,
                            "metadata": {
                                "totalItems": listings.len(),
                                "totalPages": listings.len().div_ceil(size.max(1)),
                                "pageSize": size,
                                "currentPage": page
                            }
                        }
                    }
                }
            })));
        }

        if query.contains("SingleListing") {
            let guid = Self::extract_guid(&query);
            if self.missing.lock().unwrap().contains(&guid) {
                return Ok(Self::ok(json!({ "data": { "listing": null } })));
            }
            let listing = listings.iter().find(|l| l["id"] == json!(guid)).cloned();
            return Ok(Self::ok(json!({ "data": { "listing": listing } })));
        }

        panic!("unexpected query: {query}");
    }
}

fn listing_json(id: &str, title: &str, price: f64, mileage: u64, images: &[&str]) -> Value {
    json!({
        "id": id,
        "details": {
            "description": format!("Description for {title}"),
            "vehicle": {
                "bodyType": { "raw": "estate", "formatted": "Estate" },
                "legalCategories": [ { "raw": "used" } ],
                "classification": {
                    "make": { "raw": "volvo", "formatted": "Volvo" },
                    "model": { "raw": "v60", "formatted": "V60" },
                    "modelYear": 2021
                },
                "condition": { "mileageInKm": { "raw": mileage } },
                "engine": { "power": { "hp": { "raw": 197 } } },
                "fuels": { "fuelCategory": { "raw": "diesel" } }
            },
            "prices": { "public": { "amountInEUR": { "raw": price } } },
            "media": {
                "images": images.iter()
                    .map(|url| json!({ "formats": { "webp": { "size1280x960": url } } }))
                    .collect::<Vec<_>>()
            },
            "adProduct": { "title": title },
            "publication": { "changedTimestamp": "2024-05-01T10:00:00Z" }
        }
    })
}

// ============================================================================
// Recording scheduler
// ============================================================================

#[derive(Default)]
struct RecordingScheduler {
    scheduled: Mutex<Vec<ScheduledJob>>,
    cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule_once(
        &self,
        job: ScheduledJob,
        _delay: Duration,
    ) -> bridge_traits::error::Result<()> {
        self.scheduled.lock().unwrap().push(job);
        Ok(())
    }

    async fn cancel(&self, name: &str) -> bridge_traits::error::Result<()> {
        self.cancelled.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    orchestrator: ImportOrchestrator,
    worker: MediaWorker,
    reconciler: Arc<ReconciliationEngine>,
    repo: Arc<dyn ContentRepository>,
    history: Arc<SqliteHistoryStore>,
    item_logs: Arc<SqliteItemLogStore>,
    catalog: Arc<MockCatalog>,
    scheduler: Arc<RecordingScheduler>,
    pool: SqlitePool,
}

async fn harness_with_config(catalog: Arc<MockCatalog>, config: SyncConfig) -> Harness {
    let pool = create_test_pool().await.unwrap();
    content_store::initialize(&pool).await.unwrap();

    let repo: Arc<dyn ContentRepository> = Arc::new(SqliteContentRepository::new(pool.clone()));
    let history = Arc::new(SqliteHistoryStore::new(pool.clone()));
    let item_logs = Arc::new(SqliteItemLogStore::new(pool.clone()));
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let scheduler = Arc::new(RecordingScheduler::default());

    let http: Arc<dyn HttpClient> = catalog.clone();
    let client = Arc::new(QueryClient::new(
        http.clone(),
        ApiCredentials::new("dealer", "secret"),
        ClientConfig::new("https://catalog.example.test/graphql"),
    ));
    let validator = Arc::new(ConnectionValidator::new(http.clone(), client.clone()));
    let mapper: Arc<dyn RecordMapper> = Arc::new(VehicleMapper::new());

    let queue = Arc::new(ListingQueue::new(kv.clone(), client.clone(), &config));
    let media_queue = Arc::new(MediaQueue::new(
        kv.clone(),
        scheduler.clone() as Arc<dyn Scheduler>,
        &config,
    ));
    let processor = Arc::new(ItemProcessor::new(
        client.clone(),
        repo.clone(),
        mapper,
        item_logs.clone() as Arc<dyn content_store::ItemLogStore>,
        media_queue.clone(),
    ));
    let reconciler = Arc::new(ReconciliationEngine::new(
        repo.clone(),
        client.clone(),
        queue.clone(),
        processor.clone(),
        history.clone() as Arc<dyn content_store::HistoryStore>,
        kv.clone(),
        &config,
    ));
    let orchestrator = ImportOrchestrator::new(
        validator,
        client.clone(),
        queue,
        processor,
        reconciler.clone(),
        repo.clone(),
        kv.clone(),
        Arc::new(ProgressTracker::new(kv.clone())),
        history.clone() as Arc<dyn content_store::HistoryStore>,
        item_logs.clone() as Arc<dyn content_store::ItemLogStore>,
        scheduler.clone() as Arc<dyn Scheduler>,
        config.clone(),
    );
    let worker = MediaWorker::new(
        kv,
        http,
        repo.clone(),
        scheduler.clone() as Arc<dyn Scheduler>,
        &config,
    );

    Harness {
        orchestrator,
        worker,
        reconciler,
        repo,
        history,
        item_logs,
        catalog,
        scheduler,
        pool,
    }
}

async fn harness(listings: Vec<Value>) -> Harness {
    harness_with_config(MockCatalog::new(listings), SyncConfig::default()).await
}

/// Tick until the run completes; panics if it never does.
async fn drive_to_completion(orchestrator: &ImportOrchestrator) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..200 {
        let outcome = orchestrator.tick().await.unwrap();
        let done = outcome == TickOutcome::Completed;
        outcomes.push(outcome);
        if done {
            return outcomes;
        }
    }
    panic!("run did not complete within 200 ticks");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_import_flow() {
    let h = harness(vec![
        listing_json("guid-1", "Volvo V60", 28900.0, 48000, &["https://img/1.webp"]),
        listing_json("guid-2", "Audi A4", 31500.0, 22000, &["https://img/2.webp"]),
        listing_json("guid-3", "BMW 320d", 27900.0, 61000, &[]),
    ])
    .await;

    let collected = h.orchestrator.start().await.unwrap();
    assert_eq!(collected, 3);

    let outcomes = drive_to_completion(&h.orchestrator).await;
    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Processed(ProcessAction::Imported)))
        .count();
    assert_eq!(processed, 3);

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.counters.processed, 3);
    assert_eq!(status.counters.imported, 3);
    assert_eq!(status.counters.errors, 0);
    assert_eq!(status.local_published, 3);

    // One history record for the start, one for completion.
    let records = h.history.records(HistoryQuery::default()).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, HistoryStatus::Completed);
    assert_eq!(records[0].counters.imported, 3);

    // One imported item log per listing.
    let logs = h.item_logs.records(ItemLogQuery::default()).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|log| log.action == ItemAction::Imported));

    // Each record landed with its mapped fields.
    let local = h.repo.find_by_external_id("guid-1").await.unwrap().unwrap();
    let record = h.repo.get(local).await.unwrap().unwrap();
    assert_eq!(record.title, "Volvo V60");
    assert_eq!(record.fields.get("price").map(String::as_str), Some("28900"));
}

#[tokio::test]
async fn test_second_run_updates_with_empty_changeset() {
    let h = harness(vec![listing_json(
        "guid-1",
        "Volvo V60",
        28900.0,
        48000,
        &[],
    )])
    .await;

    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    // Unchanged remote data: the second run updates in place.
    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.counters.updated, 1);
    assert_eq!(status.counters.imported, 0);

    // Still exactly one local record.
    assert_eq!(h.repo.external_id_index().await.unwrap().len(), 1);

    let updates = h
        .item_logs
        .records(ItemLogQuery {
            action: Some(ItemAction::Updated),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].changes.is_empty());
    assert_eq!(updates[0].message, "No changes detected");
}

#[tokio::test]
async fn test_update_detects_price_change() {
    let h = harness(vec![listing_json(
        "guid-1",
        "Volvo V60",
        28900.0,
        48000,
        &[],
    )])
    .await;

    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    h.catalog.set_listing_price("guid-1", 26900.0);

    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    let updates = h
        .item_logs
        .records(ItemLogQuery {
            action: Some(ItemAction::Updated),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].changes.len(), 1);
    assert_eq!(updates[0].changes[0].field, "price");
    assert_eq!(updates[0].changes[0].old.as_deref(), Some("28900"));
    assert_eq!(updates[0].changes[0].new.as_deref(), Some("26900"));
}

#[tokio::test]
async fn test_per_item_failure_is_isolated() {
    let h = harness(vec![
        listing_json("guid-1", "One", 1000.0, 1, &[]),
        listing_json("guid-2", "Two", 2000.0, 2, &[]),
        listing_json("guid-3", "Three", 3000.0, 3, &[]),
        listing_json("guid-4", "Four", 4000.0, 4, &[]),
        listing_json("guid-5", "Five", 5000.0, 5, &[]),
    ])
    .await;
    // Collected during phase 3 but gone by the time it is fetched.
    h.catalog.mark_missing("guid-3");

    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.counters.errors, 1);
    assert_eq!(status.counters.processed, 4);

    let errors = h
        .item_logs
        .records(ItemLogQuery {
            action: Some(ItemAction::Error),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].external_id, "guid-3");
}

#[tokio::test]
async fn test_stop_resume_processes_exactly_the_remainder() {
    let listings: Vec<Value> = (1..=10)
        .map(|i| listing_json(&format!("guid-{i}"), &format!("Car {i}"), 1000.0 * i as f64, i, &[]))
        .collect();
    let h = harness(listings).await;

    let total = h.orchestrator.start().await.unwrap();
    assert_eq!(total, 10);

    for _ in 0..4 {
        assert!(matches!(
            h.orchestrator.tick().await.unwrap(),
            TickOutcome::Processed(_)
        ));
    }

    assert!(h.orchestrator.stop().await.unwrap());
    assert!(h
        .scheduler
        .cancelled
        .lock()
        .unwrap()
        .contains(&sync_engine::PROCESS_JOB.to_string()));

    // Ticks while stopped do nothing.
    assert_eq!(h.orchestrator.tick().await.unwrap(), TickOutcome::Idle);
    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.status, RunStatus::Stopped);
    assert_eq!(status.counters.processed, 4);

    assert!(h.orchestrator.resume().await.unwrap());

    let outcomes = drive_to_completion(&h.orchestrator).await;
    let resumed_processed = outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Processed(_)))
        .count();
    assert_eq!(resumed_processed, 6);

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.counters.processed, 10);
    assert!(status.counters.processed <= status.total);
}

#[tokio::test]
async fn test_start_rejected_while_running() {
    let h = harness(vec![listing_json("guid-1", "One", 1000.0, 1, &[])]).await;

    h.orchestrator.start().await.unwrap();
    let err = h.orchestrator.start().await.unwrap_err();
    assert!(matches!(err, SyncError::RunInProgress));
    assert_eq!(err.kind(), "conflict");
}

#[tokio::test]
async fn test_validation_failure_creates_no_run() {
    let catalog = MockCatalog::new(vec![listing_json("guid-1", "One", 1000.0, 1, &[])]);
    catalog.hard_down.store(true, Ordering::SeqCst);
    let h = harness_with_config(catalog, SyncConfig::default()).await;

    let err = h.orchestrator.start().await.unwrap_err();
    assert_eq!(err.kind(), "connectivity");

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!(status.status, RunStatus::Idle);
    assert_eq!(status.queue.total, 0);
}

#[tokio::test]
async fn test_reconciliation_set_algebra_and_remediation() {
    // Remote has {2, 3, 4}; local starts with {1, 2, 3}.
    let h = harness(vec![
        listing_json("guid-2", "Two", 2000.0, 2, &[]),
        listing_json("guid-3", "Three", 3000.0, 3, &[]),
        listing_json("guid-4", "Four", 4000.0, 4, &[]),
    ])
    .await;

    for id in ["guid-1", "guid-2", "guid-3"] {
        h.repo
            .create(&NewContent {
                external_id: id.to_string(),
                title: id.to_string(),
                body: String::new(),
                status: ContentStatus::Published,
            })
            .await
            .unwrap();
    }

    let result = h.reconciler.compare().await.unwrap();
    assert_eq!(
        result.orphaned_local.keys().collect::<Vec<_>>(),
        vec!["guid-1"]
    );
    assert_eq!(
        result.missing_remote.iter().collect::<Vec<_>>(),
        vec!["guid-4"]
    );
    assert_eq!(result.synced.len(), 2);
    assert_eq!(result.orphaned_count() + result.synced_count(), result.local_count);
    assert_eq!(result.missing_count() + result.synced_count(), result.remote_count);

    // Trash the orphan.
    let orphans: Vec<String> = result.orphaned_local.keys().cloned().collect();
    let summary = h
        .reconciler
        .handle_orphaned(&orphans, sync_engine::OrphanPolicy::Trash)
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors, 0);

    let orphan_id = h.repo.find_by_external_id("guid-1").await.unwrap().unwrap();
    let orphan = h.repo.get(orphan_id).await.unwrap().unwrap();
    assert_eq!(orphan.status, ContentStatus::Trashed);

    // Import the missing listing.
    let missing: Vec<String> = result.missing_remote.iter().cloned().collect();
    let import = h.reconciler.import_missing(&missing).await.unwrap();
    assert_eq!(import.imported, 1);
    assert_eq!(import.errors, 0);
    assert!(h
        .repo
        .find_by_external_id("guid-4")
        .await
        .unwrap()
        .is_some());

    // Each remediation batch wrote a history record.
    let reconciliations = h
        .history
        .records(HistoryQuery {
            op_type: Some(content_store::OperationType::Reconciliation),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(reconciliations.len(), 2);
}

#[tokio::test]
async fn test_media_pipeline_with_url_deduplication() {
    let h = harness(vec![
        listing_json(
            "guid-1",
            "One",
            1000.0,
            1,
            &["https://img/shared.webp", "https://img/a.webp"],
        ),
        listing_json("guid-2", "Two", 2000.0, 2, &["https://img/shared.webp"]),
    ])
    .await;

    h.orchestrator.start().await.unwrap();
    drive_to_completion(&h.orchestrator).await;

    // The item processor scheduled one media job per listing.
    let media_jobs: Vec<ScheduledJob> = h
        .scheduler
        .scheduled
        .lock()
        .unwrap()
        .iter()
        .filter(|job| job.name.starts_with(sync_engine::MEDIA_JOB_PREFIX))
        .cloned()
        .collect();
    assert_eq!(media_jobs.len(), 2);

    // Drive each owner's worker to completion.
    for job in media_jobs {
        let owner = content_store::LocalId(job.args[0].parse().unwrap());
        loop {
            match h.worker.tick(owner).await.unwrap() {
                MediaTickOutcome::Finalized { failed, .. } => {
                    assert_eq!(failed, 0);
                    break;
                }
                MediaTickOutcome::Processed { .. } => continue,
                MediaTickOutcome::Idle => panic!("queue vanished for owner {owner}"),
            }
        }
    }

    let first = h.repo.find_by_external_id("guid-1").await.unwrap().unwrap();
    let second = h.repo.find_by_external_id("guid-2").await.unwrap().unwrap();
    assert_eq!(h.repo.get(first).await.unwrap().unwrap().gallery.len(), 2);
    assert_eq!(h.repo.get(second).await.unwrap().unwrap().gallery.len(), 1);

    // The shared URL was stored once and relinked, not fetched twice.
    let media_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(media_count, 2);
}
