use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Storage shape of an `executions` row, before codecs are applied.
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: String,
    pub job: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub context: String,
    pub success: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct JobStatsRow {
    pub job: String,
    pub total: i64,
    pub succeeded: i64,
    pub last_end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobExecutionStats {
    pub job: String,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub last_finished_at: Option<DateTime<Utc>>,
}
