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

//! # Session Port
//!
//! This Port defines what the engines need from a database client: execute a
//! statement, fetch a small result set in one shot, and stream a large one
//! row by row. The connection pool owns `DbSession`s and hands them out one at
//! a time; it does not care whether they speak to MySQL or to a test double.

use crate::domain::entities::{ResultSet, SqlValue};
use crate::domain::errors::Result;

/// A forward-only cursor over a streaming query.
///
/// Dropping the cursor closes it.
pub trait RowCursor: Iterator<Item = Result<Vec<SqlValue>>> {
    /// Column names of the result, available before the first row.
    fn columns(&self) -> &[String];
}

/// One live database session.
///
/// `Send` lets a session move between the dispatcher and a worker thread;
/// a session is never used by two threads at once.
pub trait DbSession: Send {
    /// Liveness check (ping).
    fn ping(&mut self) -> Result<()>;

    /// Executes a statement and discards any result.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query and materialises all of its rows.
    fn fetch_all(&mut self, sql: &str) -> Result<ResultSet>;

    /// Runs a query and streams its rows.
    fn stream_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>>;
}

/// Opens new sessions against one server with one set of credentials.
pub trait SessionConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn DbSession>>;

    /// Address used in log lines.
    fn address(&self) -> String;
}
