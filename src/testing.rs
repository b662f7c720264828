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

//! Test doubles shared by the unit tests.
//!
//! `FakeServer` answers queries from regex patterns with canned result sets,
//! keeps a global statement log, and tracks a tiny table store so restore tests
//! can observe the effect of DROP/CREATE/INSERT statements.

use crate::domain::entities::{ResultSet, SqlValue};
use crate::domain::errors::{DumpError, Result};
use crate::ports::bulk_load::{LoadMethod, LoadRequest, LoadResponse, LoadTransport};
use crate::ports::session::{DbSession, RowCursor, SessionConnector};
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

enum FakeResponse {
    Rows(Arc<ResultSet>),
    Error(String),
}

#[derive(Default)]
pub struct FakeServer {
    patterns: Mutex<Vec<(Regex, FakeResponse)>>,
    log: Mutex<Vec<String>>,
    tables: Mutex<HashMap<String, u64>>,
    ping_failures: AtomicUsize,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn compile(pattern: &str) -> Regex {
        Regex::new(&format!("(?is)^{}", pattern)).unwrap()
    }

    pub fn add_query_pattern(&self, pattern: &str, result: ResultSet) {
        self.patterns
            .lock()
            .unwrap()
            .push((Self::compile(pattern), FakeResponse::Rows(Arc::new(result))));
    }

    pub fn add_error_pattern(&self, pattern: &str, message: &str) {
        self.patterns
            .lock()
            .unwrap()
            .push((Self::compile(pattern), FakeResponse::Error(message.to_string())));
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn fail_next_pings(&self, n: usize) {
        self.ping_failures.store(n, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn table_rows(&self, qualified: &str) -> Option<u64> {
        self.tables.lock().unwrap().get(qualified).copied()
    }

    pub fn table_snapshot(&self) -> HashMap<String, u64> {
        self.tables.lock().unwrap().clone()
    }

    fn lookup(&self, sql: &str) -> Option<std::result::Result<Arc<ResultSet>, String>> {
        let patterns = self.patterns.lock().unwrap();
        patterns.iter().find(|(re, _)| re.is_match(sql)).map(|(_, r)| match r {
            FakeResponse::Rows(rs) => Ok(rs.clone()),
            FakeResponse::Error(msg) => Err(msg.clone()),
        })
    }
}

pub struct FakeConnector {
    pub server: Arc<FakeServer>,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self { server })
    }
}

impl SessionConnector for FakeConnector {
    fn connect(&self) -> Result<Box<dyn DbSession>> {
        if self.server.refuse.load(Ordering::SeqCst) {
            return Err(DumpError::Database("connection refused".into()));
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
            current_db: None,
        }))
    }

    fn address(&self) -> String {
        "fake:3306".to_string()
    }
}

pub struct FakeSession {
    server: Arc<FakeServer>,
    current_db: Option<String>,
}

fn unquote(name: &str) -> String {
    name.trim().trim_end_matches(';').replace('`', "")
}

impl FakeSession {
    fn qualify(&self, name: &str) -> String {
        let name = unquote(name);
        if name.contains('.') {
            name
        } else {
            format!("{}.{}", self.current_db.clone().unwrap_or_default(), name)
        }
    }

    fn apply(&mut self, sql: &str) -> Result<()> {
        let upper = sql.trim_start().to_uppercase();
        let mut tables = self.server.tables.lock().unwrap();
        if upper.starts_with("USE ") {
            self.current_db = Some(unquote(&sql.trim_start()[4..]));
        } else if let Some(rest) = upper.strip_prefix("DROP TABLE IF EXISTS ") {
            let start = sql.len() - rest.len();
            tables.remove(&self.qualify(&sql[start..]));
        } else if upper.starts_with("CREATE TABLE ") {
            let name = sql.trim_start()[13..]
                .split_whitespace()
                .next()
                .unwrap_or_default();
            let key = self.qualify(name);
            if tables.contains_key(&key) {
                return Err(DumpError::Database(format!("table {} already exists", key)));
            }
            tables.insert(key, 0);
        } else if upper.starts_with("INSERT INTO ") {
            let name = sql.trim_start()[12..].split('(').next().unwrap_or_default();
            let key = self.qualify(name);
            let rows = sql.lines().filter(|l| l.starts_with('(')).count() as u64;
            match tables.get_mut(&key) {
                Some(n) => *n += rows,
                None => return Err(DumpError::Database(format!("table {} doesn't exist", key))),
            }
        }
        Ok(())
    }
}

impl DbSession for FakeSession {
    fn ping(&mut self) -> Result<()> {
        let failures = &self.server.ping_failures;
        if failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DumpError::Database("server has gone away".into()));
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.server.log.lock().unwrap().push(sql.to_string());
        if let Some(Err(msg)) = self.server.lookup(sql) {
            return Err(DumpError::Database(msg));
        }
        self.apply(sql)
    }

    fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        self.server.log.lock().unwrap().push(sql.to_string());
        match self.server.lookup(sql) {
            Some(Ok(rs)) => Ok((*rs).clone()),
            Some(Err(msg)) => Err(DumpError::Database(msg)),
            None => Err(DumpError::Database(format!("no fake result for: {}", sql))),
        }
    }

    fn stream_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>> {
        self.server.log.lock().unwrap().push(sql.to_string());
        match self.server.lookup(sql) {
            Some(Ok(rs)) => Ok(Box::new(FakeCursor { rs, next: 0 })),
            Some(Err(msg)) => Err(DumpError::Database(msg)),
            None => Err(DumpError::Database(format!("no fake result for: {}", sql))),
        }
    }
}

struct FakeCursor {
    rs: Arc<ResultSet>,
    next: usize,
}

impl Iterator for FakeCursor {
    type Item = Result<Vec<SqlValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rs.rows.get(self.next)?.clone();
        self.next += 1;
        Some(Ok(row))
    }
}

impl RowCursor for FakeCursor {
    fn columns(&self) -> &[String] {
        &self.rs.columns
    }
}

/// Builds a one-column text result set.
pub fn text_rows(column: &str, values: &[&str]) -> ResultSet {
    ResultSet {
        columns: vec![column.to_string()],
        rows: values
            .iter()
            .map(|v| vec![SqlValue::Bytes(v.as_bytes().to_vec())])
            .collect(),
    }
}

/// A request captured by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: LoadMethod,
    pub url: String,
    pub columns: String,
    pub body: Vec<u8>,
    pub user: String,
    pub strict_mode: bool,
    pub expect_continue: bool,
}

/// Replays scripted responses and records every request.
///
/// Once the script is exhausted every request gets `fallback`.
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<LoadResponse>>>,
    fallback: LoadResponse,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    pub fn new(script: Vec<Result<LoadResponse>>, fallback: LoadResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LoadTransport for RecordingTransport {
    fn send(&self, request: &LoadRequest<'_>) -> Result<LoadResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            columns: request.columns.to_string(),
            body: request.body.to_vec(),
            user: request.user.to_string(),
            strict_mode: request.strict_mode,
            expect_continue: request.expect_continue,
        });
        match self.script.lock().unwrap().pop_front() {
            Some(r) => r,
            None => Ok(self.fallback.clone()),
        }
    }
}

/// A 200 response carrying a stream-load JSON body.
pub fn load_ok(total: u64, loaded: u64) -> LoadResponse {
    LoadResponse {
        status: 200,
        location: None,
        body: format!(
            r#"{{"Status":"Success","Message":"OK","NumberTotalRows":{},"NumberLoadedRows":{},"ErrorURL":""}}"#,
            total, loaded
        ),
    }
}
