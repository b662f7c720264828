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

//! Run configuration: a YAML/JSON file merged with command-line overrides.

use crate::domain::entities::Mode;
use crate::domain::errors::{DumpError, Result};
use crate::ports::bulk_load::LoadMethod;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

pub const PASSWORD_ENV: &str = "DBDUMP_PASSWORD";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub runtime: RuntimeConfig,
    pub dump: DumpConfig,
    pub restore: RestoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// `;`-separated statements run on every new connection.
    pub session_vars: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            session_vars: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Config value first, then the `DBDUMP_PASSWORD` environment variable.
    pub fn resolved_password(&self) -> String {
        self.password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Connections and concurrent workers; defaults to the CPU count.
    pub threads: Option<usize>,
    pub progress_interval_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: None,
            progress_interval_ms: 10_000,
            connect_timeout_secs: 30,
        }
    }
}

impl RuntimeConfig {
    pub fn threads(&self) -> usize {
        std::cmp::max(1, self.threads.unwrap_or_else(num_cpus::get))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DumpConfig {
    pub output_dir: String,
    pub mode: Mode,
    pub chunk_size_mb: u64,
    /// Row bytes per `INSERT` statement in plain-SQL mode.
    pub stmt_size: u64,
    pub databases: Vec<String>,
    /// Takes precedence over `databases` when both are set.
    pub database_regexp: Option<String>,
    pub invert_regexp: bool,
    pub tables: Vec<String>,
    /// Columns excluded from the export, keyed by table name.
    pub filters: HashMap<String, Vec<String>>,
    /// Column to SQL expression replacements, keyed by table name.
    pub selects: HashMap<String, HashMap<String, String>>,
    /// Row predicates, keyed by table name.
    pub wheres: HashMap<String, String>,
    /// Storage engines eligible for a bulk-columnar dump.
    pub columnar_engines: Vec<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            output_dir: "./dump".to_string(),
            mode: Mode::PlainSql,
            chunk_size_mb: 128,
            stmt_size: 1_000_000,
            databases: Vec::new(),
            database_regexp: None,
            invert_regexp: false,
            tables: Vec::new(),
            filters: HashMap::new(),
            selects: HashMap::new(),
            wheres: HashMap::new(),
            columnar_engines: vec!["Doris".to_string(), "InnoDB".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RestoreConfig {
    pub input_dir: String,
    pub mode: Mode,
    pub overwrite_tables: bool,
    /// Stream-load endpoints (`host[:port]`), used round-robin.
    pub load_endpoints: Vec<String>,
    pub load_method: LoadMethod,
    pub strict_mode: bool,
    pub expect_continue: bool,
    pub retry_interval_ms: u64,
    /// Unset retries transport failures forever.
    pub max_retries: Option<u32>,
    pub load_connect_timeout_secs: u64,
    pub load_timeout_secs: u64,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            input_dir: "./dump".to_string(),
            mode: Mode::PlainSql,
            overwrite_tables: false,
            load_endpoints: Vec::new(),
            load_method: LoadMethod::Put,
            strict_mode: true,
            expect_continue: true,
            retry_interval_ms: 3_000,
            max_retries: None,
            load_connect_timeout_secs: 60,
            load_timeout_secs: 600,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dump databases into chunked files
    Dump(DumpArgs),
    /// Restore a dump directory
    Restore(RestoreArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub user: Option<String>,
    #[arg(short, long)]
    pub password: Option<String>,
    #[arg(long)]
    pub session_vars: Option<String>,
    #[arg(short, long)]
    pub threads: Option<usize>,
    #[arg(long)]
    pub progress_interval_ms: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct DumpArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[arg(short, long)]
    pub output: Option<String>,
    #[arg(short, long)]
    pub mode: Option<Mode>,
    #[arg(long)]
    pub chunk_size_mb: Option<u64>,
    #[arg(long)]
    pub stmt_size: Option<u64>,
    #[arg(long, value_delimiter = ',')]
    pub databases: Vec<String>,
    #[arg(long)]
    pub database_regexp: Option<String>,
    #[arg(long)]
    pub invert_regexp: bool,
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[arg(short, long)]
    pub input: Option<String>,
    #[arg(short, long)]
    pub mode: Option<Mode>,
    #[arg(long)]
    pub overwrite_tables: bool,
    #[arg(long, value_delimiter = ',')]
    pub load_endpoints: Vec<String>,
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Loads `path` if given, otherwise starts from the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_connection(&mut self, args: &ConnectionArgs) {
        if let Some(h) = &args.host { self.database.host = h.clone(); }
        if let Some(p) = args.port { self.database.port = p; }
        if let Some(u) = &args.user { self.database.user = u.clone(); }
        if let Some(p) = &args.password { self.database.password = Some(p.clone()); }
        if let Some(s) = &args.session_vars { self.database.session_vars = s.clone(); }
        if let Some(t) = args.threads { self.runtime.threads = Some(t); }
        if let Some(i) = args.progress_interval_ms { self.runtime.progress_interval_ms = i; }
    }

    pub fn merge_dump(&mut self, args: &DumpArgs) {
        self.merge_connection(&args.connection);
        if let Some(o) = &args.output { self.dump.output_dir = o.clone(); }
        if let Some(m) = args.mode { self.dump.mode = m; }
        if let Some(c) = args.chunk_size_mb { self.dump.chunk_size_mb = c; }
        if let Some(s) = args.stmt_size { self.dump.stmt_size = s; }
        if !args.databases.is_empty() { self.dump.databases = args.databases.clone(); }
        if let Some(r) = &args.database_regexp { self.dump.database_regexp = Some(r.clone()); }
        if args.invert_regexp { self.dump.invert_regexp = true; }
        if !args.tables.is_empty() { self.dump.tables = args.tables.clone(); }
    }

    pub fn merge_restore(&mut self, args: &RestoreArgs) {
        self.merge_connection(&args.connection);
        if let Some(i) = &args.input { self.restore.input_dir = i.clone(); }
        if let Some(m) = args.mode { self.restore.mode = m; }
        if args.overwrite_tables { self.restore.overwrite_tables = true; }
        if !args.load_endpoints.is_empty() { self.restore.load_endpoints = args.load_endpoints.clone(); }
        if let Some(r) = args.max_retries { self.restore.max_retries = Some(r); }
    }

    fn validate_common(&self) -> Result<()> {
        if self.runtime.threads == Some(0) {
            return Err(DumpError::Config("threads must be at least 1".into()));
        }
        if self.runtime.progress_interval_ms == 0 {
            return Err(DumpError::Config("progress_interval_ms must be positive".into()));
        }
        if self.database.host.is_empty() {
            return Err(DumpError::Config("database host is required".into()));
        }
        Ok(())
    }

    pub fn validate_dump(&self) -> Result<()> {
        self.validate_common()?;
        if self.dump.chunk_size_mb == 0 {
            return Err(DumpError::Config("chunk_size_mb must be at least 1".into()));
        }
        if self.dump.mode == Mode::PlainSql && self.dump.stmt_size == 0 {
            return Err(DumpError::Config("stmt_size must be positive".into()));
        }
        if let Some(re) = &self.dump.database_regexp {
            regex::Regex::new(re)?;
        }
        Ok(())
    }

    pub fn validate_restore(&self) -> Result<()> {
        self.validate_common()?;
        if self.restore.mode == Mode::BulkColumnar && self.restore.load_endpoints.is_empty() {
            return Err(DumpError::Config(
                "bulk-columnar restore requires at least one load endpoint".into(),
            ));
        }
        Ok(())
    }
}
