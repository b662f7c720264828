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

//! Shared throughput counters and the ticker that logs them.

use crossbeam_channel::{bounded, select, tick, Sender};
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const MB: f64 = 1024.0 * 1024.0;

/// Cumulative bytes and rows of a run, bumped by every worker.
#[derive(Debug, Default)]
pub struct Counters {
    bytes: AtomicU64,
    rows: AtomicU64,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_row(&self, bytes: u64) {
        self.rows.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

/// Logs a status line every `interval` until dropped.
pub struct ProgressReporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn start(label: &str, counters: Arc<Counters>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let label = label.to_string();

        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            let started = Instant::now();
            let mut last_bytes = 0u64;
            let mut last_tick = started;
            loop {
                select! {
                    recv(ticker) -> _ => {
                        let now = Instant::now();
                        let bytes = counters.bytes();
                        let window = now.duration_since(last_tick).as_secs_f64();
                        let rate = if window > 0.0 {
                            (bytes - last_bytes) as f64 / MB / window
                        } else {
                            0.0
                        };
                        info!(
                            "{}: {:.2} MB, {} rows, {}s elapsed, {:.2} MB/s",
                            label,
                            bytes as f64 / MB,
                            counters.rows(),
                            now.duration_since(started).as_secs(),
                            rate
                        );
                        last_bytes = bytes;
                        last_tick = now;
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the ticker thread.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_across_threads() {
        let counters = Counters::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counters.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        c.add_row(10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        counters.add_bytes(5);
        assert_eq!(counters.rows(), 8000);
        assert_eq!(counters.bytes(), 80_005);
    }

    #[test]
    fn test_reporter_stops_on_drop() {
        let counters = Counters::new();
        let reporter =
            ProgressReporter::start("Dumping", counters.clone(), Duration::from_millis(5));
        counters.add_row(1024);
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        drop(reporter);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_reporter_stops_with_long_interval() {
        let reporter =
            ProgressReporter::start("Restoring", Counters::new(), Duration::from_secs(3600));
        let started = Instant::now();
        drop(reporter);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
