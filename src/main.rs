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

//! # dbdumper
//!
//! A parallel MySQL dump/restore tool. `dump` writes every selected table
//! into chunked `INSERT` or tab-delimited files; `restore` replays such a
//! directory into MySQL or a Doris-style stream-load endpoint.
//!
//! This application follows the **Hexagonal Architecture** (Ports and Adapters)
//! to keep the engines independent of the MySQL client and the HTTP client.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

#[cfg(test)]
mod testing;

use crate::application::dump_engine::DumpEngine;
use crate::application::restore_engine::RestoreEngine;
use crate::application::runtime::RuntimeContext;
use crate::config::{AppConfig, CliArgs, Command};
use crate::domain::entities::RunSummary;
use crate::domain::errors::Result;
use crate::infrastructure::http::stream_load::{ReqwestTransport, StreamLoadOptions, StreamLoader};
use crate::infrastructure::mysql::mysql_session::MysqlConnector;
use clap::Parser;
use log::{error, info};
use std::process;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // 1. Parse Arguments
    let args = CliArgs::parse();

    // 2. Initialize Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    // 3. Load Config
    let mut config = match AppConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    // 4. Merge CLI overrides and run
    let outcome = match &args.command {
        Command::Dump(dump_args) => {
            config.merge_dump(dump_args);
            config.validate_dump().and_then(|_| run_dump(config))
        }
        Command::Restore(restore_args) => {
            config.merge_restore(restore_args);
            config.validate_restore().and_then(|_| run_restore(config))
        }
    };

    match outcome {
        Ok(summary) if summary.failed() == 0 => {
            info!("All {} tasks succeeded.", summary.results.len());
        }
        Ok(summary) => {
            error!(
                "{} of {} tasks failed, see the report for details.",
                summary.failed(),
                summary.results.len()
            );
            process::exit(1);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            process::exit(1);
        }
    }
}

fn connect(config: &AppConfig) -> Result<RuntimeContext> {
    let connector = Arc::new(MysqlConnector::new(
        &config.database.host,
        config.database.port,
        &config.database.user,
        &config.database.resolved_password(),
        config.runtime.connect_timeout(),
    ));
    RuntimeContext::init(config, connector)
}

fn run_dump(config: AppConfig) -> Result<RunSummary> {
    let runtime = connect(&config)?;
    DumpEngine::new(config, runtime).run()
}

fn run_restore(config: AppConfig) -> Result<RunSummary> {
    let restore = &config.restore;
    let transport = Arc::new(ReqwestTransport::new(
        Duration::from_secs(restore.load_connect_timeout_secs),
        Duration::from_secs(restore.load_timeout_secs),
    )?);
    let loader = StreamLoader::new(
        transport,
        StreamLoadOptions {
            user: config.database.user.clone(),
            password: config.database.resolved_password(),
            method: restore.load_method,
            strict_mode: restore.strict_mode,
            expect_continue: restore.expect_continue,
            retry_interval: Duration::from_millis(restore.retry_interval_ms),
            max_retries: restore.max_retries,
        },
    );
    let runtime = connect(&config)?;
    RestoreEngine::new(config, runtime, loader).run()
}
