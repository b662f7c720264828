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

//! # Runtime Context
//!
//! This module acts as the "Engine Room" of a run. It owns the two resources
//! every worker needs:
//! 1. **Connection Pool**: the fixed set of database sessions. Its capacity is
//!    the only admission control; a task is spawned only after a connection
//!    has been borrowed for it.
//! 2. **Thread Pool**: a dedicated `rayon` pool with one thread more than the
//!    pool capacity, so the dispatcher blocking on a connection never takes a
//!    thread away from a running task.

use crate::config::AppConfig;
use crate::domain::entities::TaskResult;
use crate::domain::errors::{DumpError, Result};
use crate::infrastructure::pool::connection_manager::{ConnectionPool, PoolOptions, PooledConnection};
use crate::ports::session::SessionConnector;
use log::{error, info};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// A unit of work dispatched on its own connection.
pub trait WorkItem: Send {
    fn database(&self) -> &str;
    fn table(&self) -> &str;
    fn part(&self) -> Option<String> {
        None
    }
}

/// `RuntimeContext` holds the resources shared by every task of one run.
pub struct RuntimeContext {
    pub pool: Arc<ConnectionPool>,
    workers: rayon::ThreadPool,
}

impl RuntimeContext {
    /// Opens the connection pool and starts the worker threads.
    pub fn init(config: &AppConfig, connector: Arc<dyn SessionConnector>) -> Result<Self> {
        let num_threads = config.runtime.threads();
        info!("Initializing runtime with {} connections", num_threads);

        let pool = ConnectionPool::new(
            connector,
            num_threads,
            &config.database.session_vars,
            PoolOptions {
                connect_timeout: config.runtime.connect_timeout(),
                ..PoolOptions::default()
            },
        )?;
        Self::with_pool(Arc::new(pool))
    }

    pub fn with_pool(pool: Arc<ConnectionPool>) -> Result<Self> {
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(pool.capacity() + 1)
            .thread_name(|i| format!("worker-{}", i))
            .build()
            .map_err(|e| DumpError::Worker(format!("Failed to start worker threads: {}", e)))?;
        Ok(Self { pool, workers })
    }

    /// Runs `task` once per item, each on its own borrowed connection.
    ///
    /// Errors and panics inside a task become failed results; they never
    /// stop the other tasks. The connection goes back to the pool when the
    /// task ends, however it ends.
    pub fn fan_out<T, F>(&self, items: Vec<T>, task: F) -> Vec<TaskResult>
    where
        T: WorkItem,
        F: Fn(&T, &mut PooledConnection) -> Result<TaskResult> + Sync,
    {
        let results = Mutex::new(Vec::with_capacity(items.len()));
        let push = |r: TaskResult| {
            results.lock().unwrap_or_else(|e| e.into_inner()).push(r);
        };

        self.workers.scope(|scope| {
            for item in items {
                let mut conn = match self.pool.get() {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(
                            "No connection for {}.{}: {}",
                            item.database(),
                            item.table(),
                            e
                        );
                        push(TaskResult::failure(
                            item.database(),
                            item.table(),
                            item.part(),
                            None,
                            e.to_string(),
                        ));
                        continue;
                    }
                };
                let task = &task;
                let push = &push;
                scope.spawn(move |_| {
                    let worker = conn.id();
                    let outcome = catch_unwind(AssertUnwindSafe(|| task(&item, &mut conn)));
                    drop(conn);
                    let result = match outcome {
                        Ok(Ok(result)) => result,
                        Ok(Err(e)) => {
                            error!(
                                "{}.{} {} failed on worker {}: {}",
                                item.database(),
                                item.table(),
                                item.part().unwrap_or_default(),
                                worker,
                                e
                            );
                            TaskResult::failure(
                                item.database(),
                                item.table(),
                                item.part(),
                                Some(worker),
                                e.to_string(),
                            )
                        }
                        Err(panic) => {
                            let e = DumpError::Worker(panic_message(panic.as_ref()));
                            error!(
                                "{}.{} {} panicked on worker {}: {}",
                                item.database(),
                                item.table(),
                                item.part().unwrap_or_default(),
                                worker,
                                e
                            );
                            TaskResult::failure(
                                item.database(),
                                item.table(),
                                item.part(),
                                Some(worker),
                                e.to_string(),
                            )
                        }
                    };
                    push(result);
                });
            }
        });

        results.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    /// Closes the connection pool.
    pub fn shutdown(&self) {
        self.pool.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TableJob;
    use crate::testing::{FakeConnector, FakeServer};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn runtime(capacity: usize) -> RuntimeContext {
        let pool = ConnectionPool::new(
            FakeConnector::new(FakeServer::new()),
            capacity,
            "",
            PoolOptions {
                connect_timeout: Duration::from_millis(500),
                acquire_poll: Duration::from_millis(20),
            },
        )
        .unwrap();
        RuntimeContext::with_pool(Arc::new(pool)).unwrap()
    }

    fn jobs(n: usize) -> Vec<TableJob> {
        (0..n)
            .map(|i| TableJob {
                database: "db".into(),
                table: format!("t{}", i),
                where_clause: None,
            })
            .collect()
    }

    #[test]
    fn test_concurrency_never_exceeds_capacity() {
        let rt = runtime(3);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let ids = Mutex::new(HashSet::new());

        let results = rt.fan_out(jobs(24), |job, conn| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            assert!(ids.lock().unwrap().insert(conn.id()));
            std::thread::sleep(Duration::from_millis(5));
            assert!(ids.lock().unwrap().remove(&conn.id()));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(TaskResult::success(&job.database, &job.table, None, 1, 1, 0.0, conn.id()))
        });

        assert_eq!(results.len(), 24);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_failures_and_panics_are_isolated() {
        let rt = runtime(2);
        let results = rt.fan_out(jobs(6), |job, conn| match job.table.as_str() {
            "t1" => Err(DumpError::Database("table is corrupted".into())),
            "t2" => panic!("row decode failed"),
            _ => Ok(TaskResult::success(&job.database, &job.table, None, 0, 0, 0.0, conn.id())),
        });

        assert_eq!(results.len(), 6);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 2);
        let panicked = failed.iter().find(|r| r.table == "t2").unwrap();
        assert!(panicked.error.as_deref().unwrap().contains("row decode failed"));

        // Every connection came back despite the panic.
        for _ in 0..2 {
            rt.pool.get().unwrap();
        }
    }

    #[test]
    fn test_closed_pool_fails_every_task() {
        let rt = runtime(1);
        rt.shutdown();
        let results = rt.fan_out(jobs(2), |job, conn| {
            Ok(TaskResult::success(&job.database, &job.table, None, 0, 0, 0.0, conn.id()))
        });
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.is_success() && r.worker.is_none()));
    }
}
