use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Jobtrack - job execution history and pause state", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use a SQLite database file (or ":memory:") instead of the
    /// JOBTRACK_DB_* MySQL settings
    #[arg(long, env = "JOBTRACK_SQLITE")]
    pub sqlite: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Print command results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring the schema up to date and report what changed
    Migrate,

    /// Show the stored and supported schema versions
    Version,

    /// Record a finished execution
    Record {
        /// Job id
        #[arg(long)]
        job: String,

        /// Start time (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End time (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Execution context as a JSON document
        #[arg(long, default_value = "{}")]
        context: String,

        /// Mark the execution as failed
        #[arg(long)]
        failed: bool,

        /// Explicit execution id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// List successful executions, or failed ones with --failed
    History {
        #[arg(long)]
        failed: bool,

        /// Limit number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show the execution history of one job
    Job {
        /// Job id
        job: String,
    },

    /// Show per-job statistics
    Stats,

    /// Pause a job
    Pause {
        /// Job id
        job: String,
    },

    /// Unpause a job
    Unpause {
        /// Job id
        job: String,
    },

    /// List paused jobs
    Paused,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_record() {
        let cli = Cli::try_parse_from([
            "jobtrack",
            "--sqlite",
            ":memory:",
            "record",
            "--job",
            "etl",
            "--start",
            "2024-05-01T12:00:00Z",
            "--end",
            "2024-05-01T12:05:00Z",
            "--failed",
        ])
        .unwrap();

        assert_eq!(cli.sqlite.as_deref(), Some(":memory:"));
        match cli.command {
            Commands::Record {
                job,
                start,
                end,
                context,
                failed,
                id,
            } => {
                assert_eq!(job, "etl");
                assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
                assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap());
                assert_eq!(context, "{}");
                assert!(failed);
                assert!(id.is_none());
            }
            _ => panic!("expected record command"),
        }
    }

    #[test]
    fn test_record_rejects_bad_timestamp() {
        let result = Cli::try_parse_from([
            "jobtrack", "record", "--job", "etl", "--start", "yesterday", "--end",
            "2024-05-01T12:05:00Z",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["jobtrack", "stats", "--json"]).unwrap();

        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::try_parse_from(["jobtrack", "history"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::History {
                failed: false,
                limit: 20
            }
        ));
    }
}
