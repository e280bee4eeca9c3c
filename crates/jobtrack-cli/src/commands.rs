use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::Commands;
use jobtrack_core::ExecutionRecord;
use jobtrack_db::{Database, SchemaMigrator};

pub async fn execute(command: Commands, db: &Database, json: bool) -> Result<()> {
    match command {
        Commands::Migrate => {
            let report = db.migration_report();
            if json {
                return print_json(report);
            }

            if report.is_noop() {
                println!("✓ Schema already at version {}", report.current_version);
            } else {
                println!(
                    "✓ Schema migrated from version {} to {}",
                    report.previous_version, report.current_version
                );
                println!("  Applied: {:?}", report.applied);
            }
        }

        Commands::Version => {
            let current = db.schema_version().await?;
            let supported = SchemaMigrator::default().latest_version();
            if json {
                return print_json(&serde_json::json!({
                    "schema_version": current,
                    "supported_version": supported,
                }));
            }

            println!("Schema version: {}", current);
            println!("  Supported by this build: {}", supported);
        }

        Commands::Record {
            job,
            start,
            end,
            context,
            failed,
            id,
        } => {
            let context: serde_json::Value =
                serde_json::from_str(&context).context("--context is not valid JSON")?;

            let mut record = ExecutionRecord::new(job, start, end, context, !failed);
            if let Some(id) = id {
                record = record.with_id(id);
            }

            db.log_execution(&record).await?;
            if json {
                return print_json(&record);
            }

            println!("✓ Execution recorded: {}", record.id);
            println!("  Job: {}", record.job);
            println!("  Outcome: {}", outcome(record.success));
            println!("  Duration: {} seconds", record.duration().num_seconds());
        }

        Commands::History { failed, limit } => {
            let records = db.get_execution_log(!failed).await?;

            // Oldest first from the store; show the most recent ones
            let skip = records.len().saturating_sub(limit);
            let shown = &records[skip..];
            if json {
                return print_json(&shown);
            }

            println!("{} executions: {}", capitalize(outcome(!failed)), records.len());
            println!();

            for record in shown {
                print_record(record);
            }
        }

        Commands::Job { job } => {
            let records = db.job_executions(&job).await?;
            let paused = db.is_job_paused(&job).await?;
            if json {
                return print_json(&serde_json::json!({
                    "job": job,
                    "paused": paused,
                    "executions": records,
                }));
            }

            println!("Job: {}", job);
            println!("  Paused: {}", paused);
            println!("  Executions: {}", records.len());
            println!();

            for record in &records {
                print_record(record);
            }
        }

        Commands::Stats => {
            let stats = db.execution_stats().await?;
            if json {
                return print_json(&stats);
            }

            println!("Job Statistics\n");
            if stats.is_empty() {
                println!("No executions recorded");
            }

            for job in stats {
                println!("Job: {}", job.job);
                println!("  Total: {}", job.total);
                println!("  Succeeded: {}", job.succeeded);
                println!("  Failed: {}", job.failed);
                if let Some(finished) = job.last_finished_at {
                    println!("  Last finished: {}", finished);
                }
                println!();
            }
        }

        Commands::Pause { job } => {
            db.pause_job(&job).await?;
            if json {
                return print_json(&serde_json::json!({ "job": job, "paused": true }));
            }
            println!("✓ Job paused: {}", job);
        }

        Commands::Unpause { job } => {
            db.unpause_job(&job).await?;
            if json {
                return print_json(&serde_json::json!({ "job": job, "paused": false }));
            }
            println!("✓ Job unpaused: {}", job);
        }

        Commands::Paused => {
            let mut jobs: Vec<String> = db.get_paused_job_ids().await?.into_iter().collect();
            jobs.sort();
            if json {
                return print_json(&jobs);
            }

            println!("Paused jobs: {}", jobs.len());
            for job in jobs {
                println!("  {}", job);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to render JSON output")
}

fn print_record(record: &ExecutionRecord) {
    println!("ID: {}", record.id);
    println!("  Job: {}", record.job);
    println!("  Outcome: {}", outcome(record.success));
    println!("  Started: {}", record.start_time);
    println!("  Finished: {}", record.end_time);
    if !record.context.is_null() {
        println!("  Context: {}", record.context);
    }
    println!();
}

fn outcome(success: bool) -> &'static str {
    if success {
        "succeeded"
    } else {
        "failed"
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jobtrack_db::DatabaseConfig;

    async fn memory_db() -> Database {
        Database::connect(&DatabaseConfig::sqlite(":memory:"))
            .await
            .unwrap()
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("failed"), "Failed");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_record_then_pause() {
        let db = memory_db().await;

        execute(
            Commands::Record {
                job: "etl".to_string(),
                start: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
                context: r#"{"rows": 3}"#.to_string(),
                failed: false,
                id: Some("run-1".to_string()),
            },
            &db,
            false,
        )
        .await
        .unwrap();
        execute(Commands::Pause { job: "etl".to_string() }, &db, false)
            .await
            .unwrap();

        let log = db.get_execution_log(true).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, "run-1");
        assert_eq!(log[0].context["rows"], 3);
        assert!(db.is_job_paused("etl").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_rejects_malformed_context() {
        let db = memory_db().await;

        let result = execute(
            Commands::Record {
                job: "etl".to_string(),
                start: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap(),
                context: "{rows".to_string(),
                failed: true,
                id: None,
            },
            &db,
            false,
        )
        .await;

        assert!(result.is_err());
        assert!(db.get_execution_log(false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_report_render_as_json() {
        let db = memory_db().await;
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = ExecutionRecord::new("etl", start, start, serde_json::json!({}), false);
        db.log_execution(&record).await.unwrap();

        let stats: serde_json::Value =
            serde_json::from_str(&render_json(&db.execution_stats().await.unwrap()).unwrap())
                .unwrap();
        assert_eq!(stats[0]["job"], "etl");
        assert_eq!(stats[0]["failed"], 1);

        let report: serde_json::Value =
            serde_json::from_str(&render_json(db.migration_report()).unwrap()).unwrap();
        assert_eq!(report["current_version"], 2);
        assert_eq!(report["applied"], serde_json::json!([1, 2]));
    }
}
