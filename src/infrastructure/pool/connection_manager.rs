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

//! Fixed-capacity connection pool built on `r2d2`.
//!
//! * One session is opened synchronously before the pool is built, so an
//!   unreachable server or a failing session variable statement fails
//!   construction at once. Every slot is then opened eagerly.
//! * Checkout pings the session; a dead session is reconnected in place, so
//!   the slot keeps its id and its session variables.
//! * Returning a connection is dropping the guard, which also happens when a
//!   worker panics.

use crate::domain::entities::ResultSet;
use crate::domain::errors::{DumpError, Result};
use crate::ports::session::{DbSession, RowCursor, SessionConnector};
use log::{debug, info, warn};
use r2d2::{ManageConnection, Pool};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A pooled session plus the slot id used to correlate log lines.
pub struct Connection {
    id: usize,
    session: Box<dyn DbSession>,
}

impl Connection {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn execute(&mut self, sql: &str) -> Result<()> {
        self.session.execute(sql)
    }

    pub fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        self.session.fetch_all(sql)
    }

    pub fn stream_query(&mut self, sql: &str) -> Result<Box<dyn RowCursor + '_>> {
        self.session.stream_query(sql)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

/// Custom R2D2 connection manager: opens sessions through a `SessionConnector`
/// and applies the session variables to each one.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    session_vars: Vec<String>,
    next_id: AtomicUsize,
}

impl SessionManager {
    /// `session_vars` is a `;`-separated list of statements.
    pub fn new(connector: Arc<dyn SessionConnector>, session_vars: &str) -> Self {
        Self {
            connector,
            session_vars: split_session_vars(session_vars),
            next_id: AtomicUsize::new(0),
        }
    }

    fn open_session(&self) -> Result<Box<dyn DbSession>> {
        let mut session = self.connector.connect()?;
        for stmt in &self.session_vars {
            session.execute(stmt)?;
        }
        Ok(session)
    }
}

fn split_session_vars(vars: &str) -> Vec<String> {
    vars.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ManageConnection for SessionManager {
    type Connection = Connection;
    type Error = DumpError;

    fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let session = self.open_session()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!("Opened connection {} to {}", id, self.connector.address());
        Ok(Connection { id, session })
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        if let Err(e) = conn.session.ping() {
            warn!("Connection {} is invalid ({}), reconnecting...", conn.id, e);
            conn.session = self.open_session()?;
        }
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// A borrowed connection; dropping it returns the connection to the pool.
pub type PooledConnection = r2d2::PooledConnection<SessionManager>;

/// Timing knobs of the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// How long construction may take to open every slot.
    pub connect_timeout: Duration,
    /// How often a blocked `get` re-checks the pool while waiting.
    pub acquire_poll: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            acquire_poll: Duration::from_secs(5),
        }
    }
}

/// Fixed-capacity pool. Its capacity is the concurrency limit of a run.
pub struct ConnectionPool {
    inner: RwLock<Option<Pool<SessionManager>>>,
    capacity: usize,
    address: String,
    acquire_poll: Duration,
}

impl ConnectionPool {
    /// Opens `capacity` connections up front.
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        capacity: usize,
        session_vars: &str,
        options: PoolOptions,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(DumpError::Config("pool capacity must be at least 1".into()));
        }
        let address = connector.address();
        info!(
            "Initializing connection pool of {} connections to {}...",
            capacity, address
        );

        let manager = SessionManager::new(connector, session_vars);
        // A bad address or session variable fails here instead of after
        // `connect_timeout` of background retries.
        drop(manager.open_session()?);
        let size = capacity as u32;
        let pool = Pool::builder()
            .max_size(size)
            .min_idle(Some(size))
            .test_on_check_out(true)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(options.connect_timeout)
            .error_handler(Box::new(r2d2::LoggingErrorHandler))
            .build(manager)
            .map_err(|e| {
                DumpError::Pool(format!("Failed to create connection pool: {}", e))
            })?;

        Ok(Self {
            inner: RwLock::new(Some(pool)),
            capacity,
            address,
            acquire_poll: options.acquire_poll,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    fn handle(&self) -> Result<Pool<SessionManager>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DumpError::PoolClosed)
    }

    /// Blocks until a connection is free and returns it, verified alive.
    ///
    /// Fails once the pool is closed, or when a slot could not be
    /// re-established while waiting.
    pub fn get(&self) -> Result<PooledConnection> {
        loop {
            let pool = self.handle()?;
            match pool.get_timeout(self.acquire_poll) {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    if self.is_closed() {
                        return Err(DumpError::PoolClosed);
                    }
                    let state = pool.state();
                    if state.connections < pool.max_size() {
                        return Err(DumpError::Pool(format!(
                            "lost connection to {}: {}",
                            self.address, e
                        )));
                    }
                    debug!(
                        "All {} connections busy, still waiting...",
                        state.connections
                    );
                }
            }
        }
    }

    /// Closes the pool. Idle connections are dropped now; borrowed ones are
    /// dropped as soon as their guard is released.
    pub fn close(&self) {
        let pool = self
            .inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if pool.is_some() {
            info!("Closing connection pool to {}", self.address);
        }
    }
}
