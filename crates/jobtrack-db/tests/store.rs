use chrono::{DateTime, Duration, TimeZone, Utc};
use jobtrack_db::{Database, DatabaseConfig, Error, ExecutionRecord};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

async fn memory_db() -> Database {
    Database::connect(&DatabaseConfig::sqlite(":memory:"))
        .await
        .unwrap()
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn run(id: &str, job: &str, start: i64, end: i64, success: bool) -> ExecutionRecord {
    ExecutionRecord::new(job, at(start), at(end), json!({ "attempt": 1 }), success).with_id(id)
}

#[tokio::test]
async fn test_connect_migrates_fresh_database() {
    let db = memory_db().await;

    let report = db.migration_report();
    assert_eq!(report.previous_version, 0);
    assert_eq!(report.applied, vec![1, 2]);
    assert_eq!(db.schema_version().await.unwrap(), 2);
}

#[tokio::test]
async fn test_execution_log_filters_by_outcome_and_orders_by_end_time() {
    let db = memory_db().await;

    let fixture = [
        run("s-late", "etl", 0, 50, true),
        run("f-early", "etl", 0, 5, false),
        run("s-early", "report", 0, 10, true),
        run("f-late", "report", 0, 60, false),
        run("s-mid", "etl", 20, 30, true),
    ];
    for record in &fixture {
        db.log_execution(record).await.unwrap();
    }

    let succeeded = db.get_execution_log(true).await.unwrap();
    let ids: Vec<&str> = succeeded.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["s-early", "s-mid", "s-late"]);
    assert!(succeeded.iter().all(|r| r.success));

    let failed = db.get_execution_log(false).await.unwrap();
    let ids: Vec<&str> = failed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["f-early", "f-late"]);
}

#[tokio::test]
async fn test_logged_record_round_trips() {
    let db = memory_db().await;
    let start = Utc.timestamp_nanos(1_714_564_800_123_456_789);
    let record = ExecutionRecord::new(
        "nightly-export",
        start,
        start + Duration::seconds(90),
        json!({ "partition": "2024-05-01", "rows": 1200, "dry_run": false }),
        true,
    );

    db.log_execution(&record).await.unwrap();

    let stored = db.get_execution_log(true).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, record.id);
    assert_eq!(stored[0].context, record.context);
    assert_eq!(stored[0].start_time.timestamp_millis(), start.timestamp_millis());
    assert_eq!(stored[0].duration(), Duration::seconds(90));
}

#[tokio::test]
async fn test_duplicate_execution_id_is_rejected() {
    let db = memory_db().await;
    let first = run("e1", "etl", 0, 1, true);
    let second = run("e1", "other-job", 5, 6, true);

    assert_ok!(db.log_execution(&first).await);
    let err = assert_err!(db.log_execution(&second).await);

    assert!(matches!(err, Error::DuplicateExecution(ref id) if id == "e1"));
    assert!(!err.is_retriable());

    let stored = db.get_execution_log(true).await.unwrap();
    assert_eq!(stored, vec![first]);
}

#[tokio::test]
async fn test_invalid_record_is_not_stored() {
    let db = memory_db().await;
    let backwards = run("e1", "etl", 10, 0, true);

    let err = assert_err!(db.log_execution(&backwards).await);

    assert!(matches!(err, Error::Validation(_)));
    assert!(db.get_execution_log(true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_job_executions_ordered_by_start_time() {
    let db = memory_db().await;
    db.log_execution(&run("b", "etl", 30, 31, false)).await.unwrap();
    db.log_execution(&run("a", "etl", 10, 40, true)).await.unwrap();
    db.log_execution(&run("x", "report", 0, 1, true)).await.unwrap();

    let history = db.job_executions("etl").await.unwrap();

    let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_execution_stats_per_job() {
    let db = memory_db().await;
    db.log_execution(&run("1", "etl", 0, 5, true)).await.unwrap();
    db.log_execution(&run("2", "etl", 0, 9, false)).await.unwrap();
    db.log_execution(&run("3", "etl", 0, 7, true)).await.unwrap();
    db.log_execution(&run("4", "report", 0, 2, true)).await.unwrap();

    let stats = db.execution_stats().await.unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].job, "etl");
    assert_eq!(stats[0].total, 3);
    assert_eq!(stats[0].succeeded, 2);
    assert_eq!(stats[0].failed, 1);
    assert_eq!(stats[0].last_finished_at, Some(at(9)));
    assert_eq!(stats[1].job, "report");
    assert_eq!(stats[1].failed, 0);
}

#[tokio::test]
async fn test_pause_and_unpause() {
    let db = memory_db().await;

    db.pause_job("x").await.unwrap();
    assert!(db.get_paused_job_ids().await.unwrap().contains("x"));
    assert!(db.is_job_paused("x").await.unwrap());

    db.unpause_job("x").await.unwrap();
    assert!(!db.get_paused_job_ids().await.unwrap().contains("x"));
    assert!(!db.is_job_paused("x").await.unwrap());
}

#[tokio::test]
async fn test_pause_is_idempotent() {
    let db = memory_db().await;

    db.pause_job("x").await.unwrap();
    db.pause_job("x").await.unwrap();
    db.pause_job("y").await.unwrap();

    let paused = db.get_paused_job_ids().await.unwrap();
    assert_eq!(paused.len(), 2);
    assert!(paused.contains("x") && paused.contains("y"));
}

#[tokio::test]
async fn test_unpause_of_unknown_job_succeeds() {
    let db = memory_db().await;

    assert_ok!(db.unpause_job("never-paused").await);
    assert!(db.get_paused_job_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pause_rejects_empty_job_id() {
    let db = memory_db().await;

    let err = assert_err!(db.pause_job("").await);

    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_job_ids_outside_bmp_are_rejected() {
    let db = memory_db().await;

    let err = assert_err!(db.pause_job("deploy-🚀").await);
    assert!(matches!(err, Error::Validation(_)));

    let err = assert_err!(db.log_execution(&run("e1", "deploy-🚀", 0, 1, true)).await);
    assert!(matches!(err, Error::Validation(_)));

    assert_ok!(db.unpause_job("deploy-🚀").await);
    assert!(!db.is_job_paused("deploy-🚀").await.unwrap());
    assert!(db.get_execution_log(true).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repause_never_hides_the_marker_from_readers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");
    let config = DatabaseConfig::sqlite(path.to_str().unwrap()).with_pool_size(1, 4);
    let db = Database::connect(&config).await.unwrap();
    db.pause_job("x").await.unwrap();

    let writer = {
        let db = db.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                db.pause_job("x").await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut reads = 0;
    while !writer.is_finished() || reads < 200 {
        let paused = db.get_paused_job_ids().await.unwrap();
        assert!(paused.contains("x"), "marker missing after {} reads", reads);
        reads += 1;
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(db.get_paused_job_ids().await.unwrap().len(), 1);
    db.close().await;
}

#[tokio::test]
async fn test_corrupt_context_fails_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");
    let db = Database::connect(&DatabaseConfig::sqlite(path.to_str().unwrap()))
        .await
        .unwrap();
    db.log_execution(&run("e1", "etl", 0, 1, true)).await.unwrap();

    let raw = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    sqlx::query("UPDATE executions SET context = '{\"attempt\": ' WHERE id = 'e1'")
        .execute(&raw)
        .await
        .unwrap();

    let err = assert_err!(db.get_execution_log(true).await);

    assert!(matches!(err, Error::CorruptDocument { ref id, .. } if id == "e1"));
}

#[tokio::test]
async fn test_concurrent_writers_share_the_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.db");
    let config = DatabaseConfig::sqlite(path.to_str().unwrap()).with_pool_size(1, 4);
    let db = Database::connect(&config).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let record = run(&format!("e{}", i), "fanout", i, i + 1, i % 2 == 0);
            db.log_execution(&record).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.get_execution_log(true).await.unwrap().len(), 8);
    assert_eq!(db.get_execution_log(false).await.unwrap().len(), 8);
    db.close().await;
}
