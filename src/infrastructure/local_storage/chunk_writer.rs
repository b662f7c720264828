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

//! Accumulates encoded rows of one table and rotates them into part files.
//!
//! In plain-SQL mode rows are grouped into `INSERT` statements of roughly
//! `stmt_size` bytes; in bulk-columnar mode each part is a header line
//! followed by tab-delimited rows. Part files are written to a temporary
//! file in the output directory and renamed into place, so a part is either
//! complete or absent.

use crate::domain::entities::Mode;
use crate::domain::errors::Result;
use crate::domain::file_naming;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Rotation thresholds of a [`ChunkWriter`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkLimits {
    /// Buffered row bytes that trigger a new part file.
    pub chunk_bytes: u64,
    /// Buffered row bytes that close the current `INSERT` (plain-SQL only).
    pub stmt_bytes: u64,
}

impl ChunkLimits {
    pub fn new(chunk_size_mb: u64, stmt_size: u64) -> Self {
        Self {
            chunk_bytes: chunk_size_mb * BYTES_PER_MB,
            stmt_bytes: stmt_size,
        }
    }
}

pub struct ChunkWriter {
    dir: PathBuf,
    database: String,
    table: String,
    mode: Mode,
    fields: String,
    limits: ChunkLimits,
    part: usize,
    rows: Vec<Vec<u8>>,
    statements: Vec<Vec<u8>>,
    stmt_size: u64,
    chunk_size: u64,
    written: Vec<PathBuf>,
}

impl ChunkWriter {
    /// `fields` are the quoted output column names of the table.
    pub fn new(
        dir: &Path,
        database: &str,
        table: &str,
        mode: Mode,
        fields: &[String],
        limits: ChunkLimits,
    ) -> Self {
        Self {
            dir: dir.to_path_buf(),
            database: database.to_string(),
            table: table.to_string(),
            mode,
            fields: fields.join(","),
            limits,
            part: 0,
            rows: Vec::new(),
            statements: Vec::new(),
            stmt_size: 0,
            chunk_size: 0,
            written: Vec::new(),
        }
    }

    /// Buffers one encoded row, rotating statements and part files as the
    /// thresholds are crossed.
    pub fn push_row(&mut self, row: Vec<u8>) -> Result<()> {
        let len = row.len() as u64;
        self.rows.push(row);
        self.chunk_size += len;

        if self.mode == Mode::PlainSql {
            self.stmt_size += len;
            if self.stmt_size >= self.limits.stmt_bytes {
                self.close_statement();
            }
        }

        if self.chunk_size >= self.limits.chunk_bytes {
            self.write_part()?;
        }
        Ok(())
    }

    /// Flushes whatever is buffered into a final part and returns every part
    /// written, in part order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if self.chunk_size > 0 {
            self.write_part()?;
        }
        Ok(self.written)
    }

    fn close_statement(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let mut stmt = format!("INSERT INTO `{}`({}) VALUES\n", self.table, self.fields).into_bytes();
        stmt.extend_from_slice(&self.rows.join(&b",\n"[..]));
        self.statements.push(stmt);
        self.rows.clear();
        self.stmt_size = 0;
    }

    fn render(&mut self) -> Vec<u8> {
        match self.mode {
            Mode::PlainSql => {
                self.close_statement();
                let mut body = self.statements.join(&b";\n"[..]);
                body.extend_from_slice(b";\n");
                self.statements.clear();
                body
            }
            Mode::BulkColumnar => {
                let mut body = self.fields.clone().into_bytes();
                body.push(b'\n');
                body.extend_from_slice(&self.rows.join(&b"\n"[..]));
                self.rows.clear();
                body
            }
        }
    }

    fn write_part(&mut self) -> Result<()> {
        self.part += 1;
        let path = file_naming::data_part_file(
            &self.dir,
            &self.database,
            &self.table,
            self.part,
            self.mode,
        );
        let body = self.render();
        write_atomic(&path, &body)?;
        debug!(
            "Wrote part {} of {}.{} ({} bytes) to {}",
            self.part,
            self.database,
            self.table,
            body.len(),
            path.display()
        );
        self.written.push(path);
        self.chunk_size = 0;
        Ok(())
    }
}

/// Writes `content` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
