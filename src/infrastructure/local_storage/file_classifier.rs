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

//! Builds the restore inventory of a dump directory.

use crate::domain::entities::{DataFile, DatabaseFile, RestoreFileSet, SchemaFile};
use crate::domain::errors::Result;
use crate::domain::file_naming::{parse_file_name, DumpFileKind};
use log::{debug, info};
use std::path::Path;
use walkdir::WalkDir;

/// Walks `dir` recursively and buckets every dump file by kind.
///
/// Any error while walking aborts the classification. Files whose names
/// match no dump category are skipped. Results are sorted by path so the
/// replay order of schema files is stable.
pub fn classify_files(dir: &Path) -> Result<RestoreFileSet> {
    let mut set = RestoreFileSet::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let path = entry.path().to_path_buf();
        match parse_file_name(&name)? {
            Some(DumpFileKind::Database { database }) => {
                set.databases.push(DatabaseFile { path, database })
            }
            Some(DumpFileKind::Schema { database, table }) => set.schemas.push(SchemaFile {
                path,
                database,
                table,
            }),
            Some(DumpFileKind::Data {
                database,
                table,
                part,
            }) => set.data.push(DataFile {
                path,
                database,
                table,
                part,
            }),
            None => debug!("Ignoring {}", path.display()),
        }
    }

    info!(
        "Found {} database files, {} schema files and {} data files in {}",
        set.databases.len(),
        set.schemas.len(),
        set.data.len(),
        dir.display()
    );
    Ok(set)
}
