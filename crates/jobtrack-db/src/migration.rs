//! Schema evolution steps, kept as data and rendered per SQL dialect.
//!
//! A step's version is its 1-based position in [`MIGRATIONS`]. Released steps
//! must never be edited or reordered; new structure is added by appending.

use std::fmt::Write;

/// InnoDB's index key limit, in bytes.
const MYSQL_MAX_KEY_BYTES: u16 = 3072;
/// Worst-case bytes per character under utf8mb4.
const MYSQL_UTF8MB4_CHAR_BYTES: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Char(u16),
    VarChar(u16),
    Timestamp,
    Document,
    Boolean,
}

impl ColumnType {
    fn sql(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::SmallInt, _) => "SMALLINT".to_string(),
            (ColumnType::Char(len), _) => format!("CHAR({})", len),
            (ColumnType::VarChar(len), _) => format!("VARCHAR({})", len),
            (ColumnType::Timestamp, Dialect::MySql) => "DATETIME(3)".to_string(),
            (ColumnType::Timestamp, Dialect::Sqlite) => "TIMESTAMP".to_string(),
            (ColumnType::Document, _) => "TEXT".to_string(),
            (ColumnType::Boolean, _) => "BOOLEAN".to_string(),
        }
    }
}

/// A `NOT NULL` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: &'static str,
    /// Leading characters indexed on MySQL; SQLite always indexes the full value.
    pub prefix: Option<u16>,
}

impl IndexColumn {
    pub const fn full(name: &'static str) -> Self {
        Self { name, prefix: None }
    }

    pub const fn prefix(name: &'static str, len: u16) -> Self {
        Self {
            name,
            prefix: Some(len),
        }
    }

    fn sql(&self, dialect: Dialect) -> String {
        match (self.prefix, dialect) {
            (Some(len), Dialect::MySql) => format!("{}({})", self.name, len),
            _ => self.name.to_string(),
        }
    }
}

/// A secondary, non-unique index declared with its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [IndexColumn],
}

impl IndexDef {
    fn column_list(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.sql(dialect)).collect();
        columns.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static str,
    pub indexes: &'static [IndexDef],
}

impl TableDef {
    /// Statements creating the table and its indexes.
    ///
    /// MySQL gets a single `CREATE TABLE` with the indexes inline, so the
    /// whole table lands in one atomic DDL statement. SQLite has no inline
    /// index syntax and gets one `CREATE INDEX` per index after the table.
    pub fn create_statements(&self, dialect: Dialect, if_absent: bool) -> Vec<String> {
        let mut statements = vec![self.create_sql(dialect, if_absent)];

        if dialect == Dialect::Sqlite {
            for index in self.indexes {
                let mut sql = String::from("CREATE INDEX ");
                if if_absent {
                    sql.push_str("IF NOT EXISTS ");
                }
                let _ = write!(
                    sql,
                    "{} ON {} ({})",
                    index.name,
                    self.name,
                    index.column_list(dialect)
                );
                statements.push(sql);
            }
        }

        statements
    }

    /// The `CREATE TABLE` statement alone; on MySQL it carries the indexes.
    pub fn create_sql(&self, dialect: Dialect, if_absent: bool) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if if_absent {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(self.name);
        sql.push_str(" (");

        for column in self.columns {
            let _ = write!(sql, "{} {}", column.name, column.ty.sql(dialect));
            if dialect == Dialect::MySql && column.name == self.primary_key {
                if let ColumnType::VarChar(len) = column.ty {
                    // utf8mb4 keys wider than 768 characters exceed the InnoDB limit
                    if len * MYSQL_UTF8MB4_CHAR_BYTES > MYSQL_MAX_KEY_BYTES {
                        sql.push_str(" CHARACTER SET utf8mb3");
                    }
                }
            }
            sql.push_str(" NOT NULL, ");
        }

        let _ = write!(sql, "PRIMARY KEY ({})", self.primary_key);
        if dialect == Dialect::MySql {
            for index in self.indexes {
                let _ = write!(sql, ", INDEX {} ({})", index.name, index.column_list(dialect));
            }
        }
        sql.push(')');

        if dialect == Dialect::MySql {
            sql.push_str(" ENGINE=InnoDB DEFAULT CHARSET=utf8mb4");
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    CreateTable(TableDef),
}

impl SchemaChange {
    /// Render the change for `dialect`.
    ///
    /// DDL commits implicitly on MySQL, so a step whose statement committed
    /// may still be missing its version row after a crash. MySQL tables are
    /// therefore created with `IF NOT EXISTS` and a replayed step is a no-op.
    /// SQLite runs every step in one transaction and keeps the plain form.
    pub fn statements(&self, dialect: Dialect) -> Vec<String> {
        match self {
            SchemaChange::CreateTable(table) => {
                table.create_statements(dialect, dialect == Dialect::MySql)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub description: &'static str,
    pub changes: &'static [SchemaChange],
}

impl Migration {
    pub fn statements(&self, dialect: Dialect) -> Vec<String> {
        self.changes
            .iter()
            .flat_map(|change| change.statements(dialect))
            .collect()
    }
}

/// Bookkeeping table; created on demand before any step runs.
pub const SCHEMA_EVOLUTIONS: TableDef = TableDef {
    name: "schema_evolutions",
    columns: &[
        Column::new("schema_version", ColumnType::SmallInt),
        Column::new("schema_update", ColumnType::Timestamp),
    ],
    primary_key: "schema_version",
    indexes: &[],
};

const EXECUTIONS: TableDef = TableDef {
    name: "executions",
    columns: &[
        Column::new("id", ColumnType::Char(36)),
        Column::new("job", ColumnType::VarChar(1000)),
        Column::new("start_time", ColumnType::Timestamp),
        Column::new("end_time", ColumnType::Timestamp),
        Column::new("context", ColumnType::Document),
        Column::new("success", ColumnType::Boolean),
    ],
    primary_key: "id",
    indexes: &[
        IndexDef {
            name: "executions_job_idx",
            columns: &[IndexColumn::prefix("job", 255)],
        },
        IndexDef {
            name: "executions_start_time_idx",
            columns: &[IndexColumn::full("start_time")],
        },
    ],
};

const PAUSED_JOBS: TableDef = TableDef {
    name: "paused_jobs",
    columns: &[Column::new("id", ColumnType::VarChar(1000))],
    primary_key: "id",
    indexes: &[],
};

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        description: "create executions",
        changes: &[SchemaChange::CreateTable(EXECUTIONS)],
    },
    Migration {
        description: "create paused_jobs",
        changes: &[SchemaChange::CreateTable(PAUSED_JOBS)],
    },
];
