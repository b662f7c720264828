// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Domain Entities
//!
//! Entities are the "Nouns" of the engine: operating modes, column values,
//! table jobs, restore files and task results.
//!
//! We use the `serde` crate (Serialize/Deserialize) so that modes can be read
//! from YAML/JSON config and results can be written into the run report.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// `Mode` selects both the dump file format and the restore backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// `INSERT` statements replayed over the SQL protocol.
    #[default]
    #[serde(alias = "mysql")]
    PlainSql,
    /// Tab-delimited text loaded through the stream-load HTTP endpoint.
    #[serde(alias = "doris")]
    BulkColumnar,
}

impl Mode {
    /// Extension (without the dot) of the data part files produced in this mode.
    pub fn data_extension(&self) -> &'static str {
        match self {
            Mode::PlainSql => "sql",
            Mode::BulkColumnar => "csv",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::PlainSql => write!(f, "plain-sql"),
            Mode::BulkColumnar => write!(f, "bulk-columnar"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "plain-sql" | "mysql" | "sql" => Ok(Mode::PlainSql),
            "bulk-columnar" | "doris" | "csv" => Ok(Mode::BulkColumnar),
            other => Err(format!(
                "unknown mode '{}', expected 'plain-sql' or 'bulk-columnar'",
                other
            )),
        }
    }
}

/// A single column value as classified by the database client.
///
/// Numeric and temporal values keep the server's textual rendering so the
/// encoders never reformat them.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Signed(String),
    Unsigned(String),
    Float(String),
    Decimal(String),
    Temporal(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Lossy textual view, used for metadata queries (`SHOW DATABASES`, ...).
    pub fn to_text(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Signed(s)
            | SqlValue::Unsigned(s)
            | SqlValue::Float(s)
            | SqlValue::Decimal(s)
            | SqlValue::Temporal(s) => s.clone(),
            SqlValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

/// A fully materialised result set (single-shot fetch).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    /// Text of the given column for every row.
    pub fn column_text(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index).map(SqlValue::to_text))
            .collect()
    }
}

/// `TableJob` is the "To-Do" item for one table export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableJob {
    pub database: String,
    pub table: String,
    /// Row filter applied to the export query, without the `WHERE` keyword.
    pub where_clause: Option<String>,
}

/// The resolved output columns of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Quoted output column names, used for the `INSERT` column list and the CSV header.
    pub fields: Vec<String>,
    /// Select-list entries; either the quoted column or `expr AS `column``.
    pub select_exprs: Vec<String>,
}

impl Projection {
    /// Applies the exclusion set and the replacement map to the sampled column list.
    pub fn resolve(
        columns: &[String],
        excluded: Option<&HashSet<String>>,
        replacements: Option<&HashMap<String, String>>,
    ) -> Self {
        let mut projection = Projection::default();
        for name in columns {
            if excluded.map_or(false, |set| set.contains(name)) {
                continue;
            }
            projection.fields.push(format!("`{}`", name));
            match replacements.and_then(|m| m.get(name)) {
                Some(expr) => projection
                    .select_exprs
                    .push(format!("{} AS `{}`", expr, name)),
                None => projection.select_exprs.push(format!("`{}`", name)),
            }
        }
        projection
    }

    /// Builds the streaming export query for a table.
    pub fn select_sql(&self, job: &TableJob) -> String {
        let mut sql = format!(
            "SELECT {} FROM `{}`.`{}`",
            self.select_exprs.join(", "),
            job.database,
            job.table
        );
        if let Some(w) = &job.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        sql
    }
}

/// A `{db}-schema-create.sql` file found in a dump directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseFile {
    pub path: PathBuf,
    pub database: String,
}

/// A `{db}.{table}-schema.sql` file found in a dump directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFile {
    pub path: PathBuf,
    pub database: String,
    pub table: String,
}

/// A `{db}.{table}.{part}.{sql|csv}` data file found in a dump directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: PathBuf,
    pub database: String,
    pub table: String,
    pub part: String,
}

/// The partition of a dump directory into database, schema and data files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreFileSet {
    pub databases: Vec<DatabaseFile>,
    pub schemas: Vec<SchemaFile>,
    pub data: Vec<DataFile>,
}

/// Outcome status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// `TaskResult` is the "Report Card" for one table (dump) or one file (restore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub database: String,
    pub table: String,
    /// Part number for restore tasks; `None` for whole-table dump tasks.
    pub part: Option<String>,
    pub rows: u64,
    pub bytes: u64,
    /// Wall-clock time taken in seconds.
    pub duration: f64,
    pub status: TaskStatus,
    pub error: Option<String>,
    /// Connection slot that ran the task.
    pub worker: Option<usize>,
    pub completed_at: String,
}

impl TaskResult {
    /// Helper to create a successful result.
    pub fn success(
        database: &str,
        table: &str,
        part: Option<String>,
        rows: u64,
        bytes: u64,
        duration: f64,
        worker: usize,
    ) -> Self {
        Self {
            database: database.to_string(),
            table: table.to_string(),
            part,
            rows,
            bytes,
            duration,
            status: TaskStatus::Success,
            error: None,
            worker: Some(worker),
            completed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Helper to create a failure result.
    pub fn failure(
        database: &str,
        table: &str,
        part: Option<String>,
        worker: Option<usize>,
        error: String,
    ) -> Self {
        Self {
            database: database.to_string(),
            table: table.to_string(),
            part,
            rows: 0,
            bytes: 0,
            duration: 0.0,
            status: TaskStatus::Failed,
            error: Some(error),
            worker,
            completed_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// Aggregate outcome of a whole dump or restore run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<TaskResult>,
    pub rows: u64,
    pub bytes: u64,
    pub duration_secs: f64,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failed()
    }
}
