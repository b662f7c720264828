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

//! The dump side of the engine.
//!
//! Discovery (databases, tables, database schema files) runs on a single
//! borrowed connection before any worker starts. Every table is then exported
//! by one task on its own connection: schema file first, then the streamed
//! rows, chunked into numbered part files.

use crate::application::progress::{Counters, ProgressReporter};
use crate::application::report::write_report;
use crate::application::runtime::{RuntimeContext, WorkItem};
use crate::config::AppConfig;
use crate::domain::encoding::encode_row;
use crate::domain::entities::{Mode, Projection, RunSummary, TableJob, TaskResult};
use crate::domain::errors::{DumpError, Result};
use crate::domain::file_naming::{database_schema_file, metadata_file, table_schema_file};
use crate::infrastructure::local_storage::chunk_writer::{write_atomic, ChunkLimits, ChunkWriter};
use crate::infrastructure::pool::connection_manager::PooledConnection;
use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

impl WorkItem for TableJob {
    fn database(&self) -> &str {
        &self.database
    }

    fn table(&self) -> &str {
        &self.table
    }
}

pub struct DumpEngine {
    config: AppConfig,
    runtime: RuntimeContext,
    counters: Arc<Counters>,
}

impl DumpEngine {
    pub fn new(config: AppConfig, runtime: RuntimeContext) -> Self {
        Self {
            config,
            runtime,
            counters: Counters::new(),
        }
    }

    /// Dumps every selected table and closes the pool.
    ///
    /// Setup failures (pool, discovery, the output directory) are returned
    /// as errors. A failing table only marks its own result as failed.
    pub fn run(&self) -> Result<RunSummary> {
        let result = self.execute();
        self.runtime.shutdown();
        result
    }

    fn execute(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let out_dir = PathBuf::from(&self.config.dump.output_dir);
        info!(
            "Starting {} dump from {} into {}",
            self.config.dump.mode,
            self.runtime.pool.address(),
            out_dir.display()
        );

        fs::create_dir_all(&out_dir)?;
        write_atomic(&metadata_file(&out_dir), b"")?;

        let jobs = {
            let mut conn = self.runtime.pool.get()?;
            self.plan(&mut conn, &out_dir)?
        };
        if jobs.is_empty() {
            info!("No tables found to dump.");
        } else {
            info!("Dumping {} tables", jobs.len());
        }

        let results = {
            let _progress = ProgressReporter::start(
                "Dumping",
                self.counters.clone(),
                self.config.runtime.progress_interval(),
            );
            self.runtime
                .fan_out(jobs, |job, conn| self.dump_table(job, conn, &out_dir))
        };

        let summary = RunSummary {
            results,
            rows: self.counters.rows(),
            bytes: self.counters.bytes(),
            duration_secs: start.elapsed().as_secs_f64(),
        };
        let report = write_report(&out_dir, "dump", &summary.results, summary.duration_secs)?;
        info!(
            "Dump finished in {:.2}s: {} tables ok, {} failed, {} rows, {} bytes. Report: {}",
            summary.duration_secs,
            summary.succeeded(),
            summary.failed(),
            summary.rows,
            summary.bytes,
            report.display()
        );
        Ok(summary)
    }

    /// Resolves databases and tables, writing each database schema file on the way.
    fn plan(&self, conn: &mut PooledConnection, out_dir: &Path) -> Result<Vec<TableJob>> {
        let mut jobs = Vec::new();
        for database in self.resolve_databases(conn)? {
            conn.execute(&format!("USE `{}`", database))?;
            write_atomic(
                &database_schema_file(out_dir, &database),
                format!("CREATE DATABASE IF NOT EXISTS `{}`;", database).as_bytes(),
            )?;

            for table in self.resolve_tables(conn, &database)? {
                let where_clause = self.config.dump.wheres.get(&table).cloned();
                jobs.push(TableJob {
                    database: database.clone(),
                    table,
                    where_clause,
                });
            }
        }
        Ok(jobs)
    }

    fn resolve_databases(&self, conn: &mut PooledConnection) -> Result<Vec<String>> {
        let dump = &self.config.dump;
        if let Some(pattern) = &dump.database_regexp {
            let re = Regex::new(pattern)?;
            let all = conn.fetch_all("SHOW DATABASES")?.column_text(0);
            let selected: Vec<String> = all
                .into_iter()
                .filter(|db| re.is_match(db) != dump.invert_regexp)
                .collect();
            info!(
                "Database regexp '{}'{} selected: {:?}",
                pattern,
                if dump.invert_regexp { " (inverted)" } else { "" },
                selected
            );
            return Ok(selected);
        }
        if !dump.databases.is_empty() {
            return Ok(dump.databases.clone());
        }
        Ok(conn.fetch_all("SHOW DATABASES")?.column_text(0))
    }

    fn resolve_tables(&self, conn: &mut PooledConnection, database: &str) -> Result<Vec<String>> {
        let tables = if self.config.dump.tables.is_empty() {
            conn.fetch_all(&format!("SHOW TABLES FROM `{}`", database))?
                .column_text(0)
        } else {
            self.config.dump.tables.clone()
        };

        if self.config.dump.mode != Mode::BulkColumnar || tables.is_empty() {
            return Ok(tables);
        }

        let sql = format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = {} AND table_name IN ({}) AND engine IN ({})",
            quote_literal(database),
            tables.iter().map(|t| quote_literal(t)).collect::<Vec<_>>().join(","),
            self.config
                .dump
                .columnar_engines
                .iter()
                .map(|e| quote_literal(e))
                .collect::<Vec<_>>()
                .join(",")
        );
        let eligible = conn.fetch_all(&sql)?.column_text(0);
        for skipped in tables.iter().filter(|t| !eligible.contains(t)) {
            info!("Skipping {}.{}: storage engine not supported", database, skipped);
        }
        Ok(eligible)
    }

    fn dump_table(
        &self,
        job: &TableJob,
        conn: &mut PooledConnection,
        out_dir: &Path,
    ) -> Result<TaskResult> {
        let started = Instant::now();
        let worker = conn.id();
        let dump = &self.config.dump;
        info!("Dumping {}.{} on worker {}", job.database, job.table, worker);

        self.dump_schema(job, conn, out_dir)?;

        let sample = conn.fetch_all(&format!(
            "SELECT * FROM `{}`.`{}` LIMIT 1",
            job.database, job.table
        ))?;
        let excluded: Option<HashSet<String>> = dump
            .filters
            .get(&job.table)
            .map(|cols| cols.iter().cloned().collect());
        let projection = Projection::resolve(
            &sample.columns,
            excluded.as_ref(),
            dump.selects.get(&job.table),
        );

        let sql = projection.select_sql(job);
        debug!("{}", sql);

        let mut writer = ChunkWriter::new(
            out_dir,
            &job.database,
            &job.table,
            dump.mode,
            &projection.fields,
            ChunkLimits::new(dump.chunk_size_mb, dump.stmt_size),
        );
        let mut rows = 0u64;
        let mut bytes = 0u64;
        {
            let cursor = conn.stream_query(&sql)?;
            for row in cursor {
                let encoded = encode_row(dump.mode, &row?);
                let len = encoded.len() as u64;
                self.counters.add_row(len);
                rows += 1;
                bytes += len;
                writer.push_row(encoded)?;
            }
        }
        let parts = writer.finish()?;

        let duration = started.elapsed().as_secs_f64();
        info!(
            "Dumped {}.{}: {} rows, {} bytes, {} parts in {:.2}s",
            job.database,
            job.table,
            rows,
            bytes,
            parts.len(),
            duration
        );
        Ok(TaskResult::success(
            &job.database,
            &job.table,
            None,
            rows,
            bytes,
            duration,
            worker,
        ))
    }

    fn dump_schema(&self, job: &TableJob, conn: &mut PooledConnection, out_dir: &Path) -> Result<()> {
        let rs = conn.fetch_all(&format!(
            "SHOW CREATE TABLE `{}`.`{}`",
            job.database, job.table
        ))?;
        let ddl = rs
            .rows
            .first()
            .and_then(|row| row.get(1))
            .map(|v| v.to_text())
            .ok_or_else(|| {
                DumpError::Database(format!(
                    "SHOW CREATE TABLE returned nothing for {}.{}",
                    job.database, job.table
                ))
            })?;
        let ddl = match self.config.dump.mode {
            Mode::PlainSql => ddl,
            Mode::BulkColumnar => columnar_schema(&ddl),
        };
        write_atomic(
            &table_schema_file(out_dir, &job.database, &job.table),
            format!("{};\n", ddl).as_bytes(),
        )
    }
}

/// Adjusts a table definition for the columnar store: unique-key tables
/// drop the `REPLACE` aggregation and `varchar(255)` is widened.
pub fn columnar_schema(ddl: &str) -> String {
    let ddl = if ddl.contains("UNIQUE KEY") {
        ddl.replace(" REPLACE", "")
    } else {
        ddl.to_string()
    };
    ddl.replace("varchar(255)", "varchar(512)")
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}
