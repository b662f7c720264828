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

//! The restore side of the engine.
//!
//! Phases run strictly in order:
//! 1. database files, verbatim, on one connection;
//! 2. table schema files, statement by statement, on one connection;
//! 3. data files, shuffled and fanned out across the pool.
//!
//! Data files go either through the SQL connection (`plain-sql`) or through
//! the stream-load HTTP endpoint (`bulk-columnar`).

use crate::application::progress::{Counters, ProgressReporter};
use crate::application::report::write_report;
use crate::application::runtime::{RuntimeContext, WorkItem};
use crate::config::AppConfig;
use crate::domain::entities::{DataFile, DatabaseFile, Mode, RunSummary, SchemaFile, TaskResult};
use crate::domain::errors::{DumpError, Result};
use crate::infrastructure::http::stream_load::{normalize_endpoint, StreamLoader};
use crate::infrastructure::local_storage::file_classifier::classify_files;
use crate::infrastructure::pool::connection_manager::PooledConnection;
use log::{error, info};
use rand::seq::SliceRandom;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use std::sync::Arc;

/// One data file plus the load endpoint assigned to it.
struct DataTask {
    file: DataFile,
    endpoint: Option<String>,
}

impl WorkItem for DataTask {
    fn database(&self) -> &str {
        &self.file.database
    }

    fn table(&self) -> &str {
        &self.file.table
    }

    fn part(&self) -> Option<String> {
        Some(self.file.part.clone())
    }
}

fn invalid_data(path: &Path, reason: impl std::fmt::Display) -> DumpError {
    DumpError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{}: {}", path.display(), reason),
    ))
}

/// Statements of a dump file: split on `;\n`, comments and blanks dropped.
fn executable_statements(content: &str) -> impl Iterator<Item = &str> {
    content.split(";\n").filter(|stmt| {
        let stmt = stmt.trim();
        !stmt.is_empty() && !stmt.starts_with("/*")
    })
}

pub struct RestoreEngine {
    config: AppConfig,
    runtime: RuntimeContext,
    loader: StreamLoader,
    counters: Arc<Counters>,
}

impl RestoreEngine {
    pub fn new(config: AppConfig, runtime: RuntimeContext, loader: StreamLoader) -> Self {
        Self {
            config,
            runtime,
            loader,
            counters: Counters::new(),
        }
    }

    /// Restores a dump directory and closes the pool.
    ///
    /// An unreadable directory or a failing database file aborts the run.
    /// Schema and data files fail one by one.
    pub fn run(&self) -> Result<RunSummary> {
        let result = self.execute();
        self.runtime.shutdown();
        result
    }

    fn execute(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let restore = &self.config.restore;
        let dir = Path::new(&restore.input_dir);
        info!(
            "Starting {} restore of {} into {}",
            restore.mode,
            dir.display(),
            self.runtime.pool.address()
        );

        let files = classify_files(dir)?;

        let mut results = {
            let mut conn = self.runtime.pool.get()?;
            self.restore_databases(&mut conn, &files.databases)?;
            self.restore_schemas(&mut conn, &files.schemas)
        };

        let mut data = files.data;
        data.shuffle(&mut rand::thread_rng());
        let endpoints: Vec<String> = restore
            .load_endpoints
            .iter()
            .map(|e| normalize_endpoint(e))
            .collect();
        let tasks: Vec<DataTask> = data
            .into_iter()
            .enumerate()
            .map(|(idx, file)| DataTask {
                file,
                endpoint: if endpoints.is_empty() {
                    None
                } else {
                    Some(endpoints[idx % endpoints.len()].clone())
                },
            })
            .collect();

        {
            let _progress = ProgressReporter::start(
                "Restoring",
                self.counters.clone(),
                self.config.runtime.progress_interval(),
            );
            results.extend(
                self.runtime
                    .fan_out(tasks, |task, conn| self.restore_data_file(task, conn)),
            );
        }

        let summary = RunSummary {
            results,
            rows: self.counters.rows(),
            bytes: self.counters.bytes(),
            duration_secs: start.elapsed().as_secs_f64(),
        };
        let report = write_report(dir, "restore", &summary.results, summary.duration_secs)?;
        info!(
            "Restore finished in {:.2}s: {} files ok, {} failed, {} rows, {} bytes. Report: {}",
            summary.duration_secs,
            summary.succeeded(),
            summary.failed(),
            summary.rows,
            summary.bytes,
            report.display()
        );
        Ok(summary)
    }

    fn restore_databases(&self, conn: &mut PooledConnection, files: &[DatabaseFile]) -> Result<()> {
        for file in files {
            info!("Restoring database {} from {}", file.database, file.path.display());
            let sql = fs::read_to_string(&file.path)?;
            conn.execute(&sql)?;
        }
        Ok(())
    }

    fn restore_schemas(&self, conn: &mut PooledConnection, files: &[SchemaFile]) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let started = Instant::now();
            match self.restore_schema(conn, file) {
                Ok(bytes) => {
                    info!("Restored schema of {}.{}", file.database, file.table);
                    results.push(TaskResult::success(
                        &file.database,
                        &file.table,
                        None,
                        0,
                        bytes,
                        started.elapsed().as_secs_f64(),
                        conn.id(),
                    ));
                }
                Err(e) => {
                    error!("Schema of {}.{} failed: {}", file.database, file.table, e);
                    results.push(TaskResult::failure(
                        &file.database,
                        &file.table,
                        None,
                        Some(conn.id()),
                        e.to_string(),
                    ));
                }
            }
        }
        results
    }

    fn restore_schema(&self, conn: &mut PooledConnection, file: &SchemaFile) -> Result<u64> {
        let content = fs::read_to_string(&file.path)?;
        conn.execute(&format!("USE `{}`", file.database))?;

        let mut dropped = !self.config.restore.overwrite_tables;
        for stmt in executable_statements(&content) {
            if !dropped && stmt.trim_start().to_uppercase().starts_with("CREATE TABLE") {
                conn.execute(&format!(
                    "DROP TABLE IF EXISTS `{}`.`{}`",
                    file.database, file.table
                ))?;
                dropped = true;
            }
            conn.execute(stmt)?;
        }
        Ok(content.len() as u64)
    }

    fn restore_data_file(&self, task: &DataTask, conn: &mut PooledConnection) -> Result<TaskResult> {
        let started = Instant::now();
        let worker = conn.id();
        let file = &task.file;
        info!(
            "Restoring {}.{} part {} on worker {}",
            file.database, file.table, file.part, worker
        );

        let content = fs::read(&file.path)?;
        let bytes = content.len() as u64;
        let rows = match self.config.restore.mode {
            Mode::PlainSql => {
                let content =
                    std::str::from_utf8(&content).map_err(|e| invalid_data(&file.path, e))?;
                conn.execute(&format!("USE `{}`", file.database))?;
                let mut rows = 0u64;
                for stmt in executable_statements(&content) {
                    conn.execute(stmt)?;
                    rows += stmt.lines().filter(|l| l.starts_with('(')).count() as u64;
                }
                rows
            }
            Mode::BulkColumnar => {
                let endpoint = task.endpoint.as_deref().ok_or_else(|| {
                    DumpError::Config("no load endpoint configured".into())
                })?;
                let newline = content
                    .iter()
                    .position(|&b| b == b'\n')
                    .ok_or_else(|| invalid_data(&file.path, "no header line"))?;
                let header = std::str::from_utf8(&content[..newline])
                    .map_err(|e| invalid_data(&file.path, e))?;
                let body = &content[newline + 1..];
                self.loader
                    .load_with_retry(endpoint, &file.database, &file.table, header, body)?
                    .number_loaded_rows
            }
        };

        self.counters.add_bytes(bytes);
        self.counters.add_rows(rows);

        let duration = started.elapsed().as_secs_f64();
        info!(
            "Restored {}.{} part {}: {} rows, {} bytes in {:.2}s",
            file.database, file.table, file.part, rows, bytes, duration
        );
        Ok(TaskResult::success(
            &file.database,
            &file.table,
            Some(file.part.clone()),
            rows,
            bytes,
            duration,
            worker,
        ))
    }
}
