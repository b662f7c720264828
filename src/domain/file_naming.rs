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

//! File naming conventions of a dump directory.
//!
//! ```text
//! metadata                          empty marker
//! {db}-schema-create.sql            CREATE DATABASE IF NOT EXISTS
//! {db}.{table}-schema.sql           CREATE TABLE
//! {db}.{table}.{00001}.sql|.csv     data parts
//! ```
//!
//! Names are built here when dumping and parsed here, exactly once, when a
//! directory is classified for restore.

use crate::domain::entities::Mode;
use crate::domain::errors::{DumpError, Result};
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "metadata";
pub const DATABASE_SCHEMA_SUFFIX: &str = "-schema-create.sql";
pub const TABLE_SCHEMA_SUFFIX: &str = "-schema.sql";
pub const SQL_DATA_SUFFIX: &str = ".sql";
pub const CSV_DATA_SUFFIX: &str = ".csv";

/// Part number assigned when a data file name carries none.
pub const DEFAULT_PART: &str = "0";

pub fn metadata_file(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
}

pub fn database_schema_file(dir: &Path, database: &str) -> PathBuf {
    dir.join(format!("{}{}", database, DATABASE_SCHEMA_SUFFIX))
}

pub fn table_schema_file(dir: &Path, database: &str, table: &str) -> PathBuf {
    dir.join(format!("{}.{}{}", database, table, TABLE_SCHEMA_SUFFIX))
}

pub fn data_part_file(dir: &Path, database: &str, table: &str, part: usize, mode: Mode) -> PathBuf {
    dir.join(format!(
        "{}.{}.{:05}.{}",
        database,
        table,
        part,
        mode.data_extension()
    ))
}

/// What a file name in a dump directory denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpFileKind {
    Database {
        database: String,
    },
    Schema {
        database: String,
        table: String,
    },
    Data {
        database: String,
        table: String,
        part: String,
    },
}

/// Classifies a bare file name.
///
/// Suffix priority is database-creation, then table schema, then data.
/// Returns `Ok(None)` for files that belong to none of the categories.
pub fn parse_file_name(name: &str) -> Result<Option<DumpFileKind>> {
    if let Some(db) = name.strip_suffix(DATABASE_SCHEMA_SUFFIX) {
        return Ok(Some(DumpFileKind::Database {
            database: db.to_string(),
        }));
    }

    if let Some(stem) = name.strip_suffix(TABLE_SCHEMA_SUFFIX) {
        let mut parts = stem.split('.');
        return match (parts.next(), parts.next()) {
            (Some(db), Some(table)) if !db.is_empty() && !table.is_empty() => {
                Ok(Some(DumpFileKind::Schema {
                    database: db.to_string(),
                    table: table.to_string(),
                }))
            }
            _ => Err(DumpError::InvalidFileName(name.to_string())),
        };
    }

    let stem = match name
        .strip_suffix(SQL_DATA_SUFFIX)
        .or_else(|| name.strip_suffix(CSV_DATA_SUFFIX))
    {
        Some(s) => s,
        None => return Ok(None),
    };

    let parts: Vec<&str> = stem.split('.').collect();
    if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(DumpError::InvalidFileName(name.to_string()));
    }
    Ok(Some(DumpFileKind::Data {
        database: parts[0].to_string(),
        table: parts[1].to_string(),
        part: parts
            .get(2)
            .map(|p| p.to_string())
            .unwrap_or_else(|| DEFAULT_PART.to_string()),
    }))
}
