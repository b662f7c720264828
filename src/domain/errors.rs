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

//! Core error definitions for the dump/restore engine.
//!
//! This module provides a centralized `DumpError` enum and a `Result` type
//! used throughout the application to handle database, pool, I/O, HTTP and
//! configuration errors.

use thiserror::Error;

/// Error types encountered during a dump or restore run.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Stream load rejected for {table}: {message} (error url: {error_url})")]
    LoadRejected {
        table: String,
        message: String,
        error_url: String,
    },

    #[error("Unrecognised dump file name: {0}")]
    InvalidFileName(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<mysql::Error> for DumpError {
    fn from(e: mysql::Error) -> Self {
        DumpError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(e: serde_json::Error) -> Self {
        DumpError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for DumpError {
    fn from(e: serde_yaml::Error) -> Self {
        DumpError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for DumpError {
    fn from(e: reqwest::Error) -> Self {
        DumpError::Http(e.to_string())
    }
}

impl From<regex::Error> for DumpError {
    fn from(e: regex::Error) -> Self {
        DumpError::Config(format!("invalid database regexp: {}", e))
    }
}

impl From<walkdir::Error> for DumpError {
    fn from(e: walkdir::Error) -> Self {
        DumpError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}

/// A specialized Result type for the dump/restore engine.
pub type Result<T> = std::result::Result<T, DumpError>;
