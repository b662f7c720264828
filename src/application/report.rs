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

//! JSON run report written next to the dump files.

use crate::domain::entities::TaskResult;
use crate::domain::errors::Result;
use serde_json::json;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes `report_<kind>_<timestamp>.json` into `dir` and returns its path.
pub fn write_report(
    dir: &Path,
    kind: &str,
    results: &[TaskResult],
    duration_secs: f64,
) -> Result<PathBuf> {
    let success = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - success;
    let total_rows: u64 = results.iter().map(|r| r.rows).sum();
    let total_bytes: u64 = results.iter().map(|r| r.bytes).sum();

    let report = json!({
        "summary": {
            "kind": kind,
            "total_tasks": results.len(),
            "success": success,
            "failed": failed,
            "total_rows": total_rows,
            "total_bytes": total_bytes,
            "total_duration_seconds": duration_secs,
            "total_mb_per_sec": if duration_secs > 0.0 { (total_bytes as f64 / 1024.0 / 1024.0) / duration_secs } else { 0.0 }
        },
        "details": results
    });

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let report_path = dir.join(format!("report_{}_{}.json", kind, timestamp));

    std::fs::create_dir_all(dir)?;
    let file = File::create(&report_path)?;
    serde_json::to_writer_pretty(file, &report)?;

    Ok(report_path)
}
