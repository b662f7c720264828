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

//! Infrastructure adapter implementing the session port on top of the
//! synchronous `mysql` client.
//!
//! Queries run over the text protocol, so the server's own rendering of
//! numbers and temporals is preserved; the column metadata decides how each
//! value is classified.

use crate::domain::entities::{ResultSet, SqlValue};
use crate::domain::errors::Result;
use crate::ports::session::{DbSession, RowCursor, SessionConnector};
use mysql::consts::{ColumnFlags, ColumnType};
use mysql::prelude::Queryable;
use mysql::{Column, Conn, Opts, OptsBuilder, QueryResult, Text, Value};
use std::time::Duration;

/// Opens sessions against one MySQL-compatible server.
pub struct MysqlConnector {
    opts: Opts,
    address: String,
}

impl MysqlConnector {
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        connect_timeout: Duration,
    ) -> Self {
        let builder = OptsBuilder::new()
            .ip_or_hostname(Some(host))
            .tcp_port(port)
            .user(Some(user))
            .pass(Some(password))
            .prefer_socket(false)
            .tcp_connect_timeout(Some(connect_timeout));
        Self {
            opts: Opts::from(builder),
            address: format!("{}:{}", host, port),
        }
    }
}

impl SessionConnector for MysqlConnector {
    fn connect(&self) -> Result<Box<dyn DbSession>> {
        let conn = Conn::new(self.opts.clone())?;
        Ok(Box::new(MysqlSession { conn }))
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

pub struct MysqlSession {
    conn: Conn,
}

impl DbSession for MysqlSession {
    fn ping(&mut self) -> Result<()> {
        self.conn.query_drop("SELECT 1")?;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn.query_drop(sql)?;
        Ok(())
    }

    fn fetch_all(&mut self, sql: &str) -> Result<ResultSet> {
        let mut cursor = MysqlCursor::open(&mut self.conn, sql)?;
        let mut rs = ResultSet {
            columns: cursor.columns().to_vec(),
            rows: Vec::new(),
        };
        for row in &mut cursor {
            rs.rows.push(row?);
        }
        Ok(rs)
    }

    fn stream_query<'a>(&'a mut self, sql: &str) -> Result<Box<dyn RowCursor + 'a>> {
        Ok(Box::new(MysqlCursor::open(&mut self.conn, sql)?))
    }
}

/// How the values of a column are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Signed,
    Unsigned,
    Float,
    Decimal,
    Temporal,
    Bytes,
}

fn classify_column(column_type: ColumnType, flags: ColumnFlags) -> ValueKind {
    use ColumnType::*;
    match column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
            if flags.contains(ColumnFlags::UNSIGNED_FLAG) {
                ValueKind::Unsigned
            } else {
                ValueKind::Signed
            }
        }
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => ValueKind::Float,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => ValueKind::Decimal,
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2
        | MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP
        | MYSQL_TYPE_TIMESTAMP2 => ValueKind::Temporal,
        _ => ValueKind::Bytes,
    }
}

fn convert_value(kind: ValueKind, value: Value) -> SqlValue {
    let text = match value {
        Value::NULL => return SqlValue::Null,
        Value::Bytes(b) => {
            if kind == ValueKind::Bytes {
                return SqlValue::Bytes(b);
            }
            String::from_utf8_lossy(&b).into_owned()
        }
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(y, m, d, h, mi, s, us) => {
            if us > 0 {
                format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}", y, m, d, h, mi, s, us)
            } else {
                format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, mi, s)
            }
        }
        Value::Time(neg, days, h, mi, s, us) => {
            let sign = if neg { "-" } else { "" };
            let hours = days * 24 + h as u32;
            if us > 0 {
                format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, mi, s, us)
            } else {
                format!("{}{:02}:{:02}:{:02}", sign, hours, mi, s)
            }
        }
    };
    match kind {
        ValueKind::Signed => SqlValue::Signed(text),
        ValueKind::Unsigned => SqlValue::Unsigned(text),
        ValueKind::Float => SqlValue::Float(text),
        ValueKind::Decimal => SqlValue::Decimal(text),
        ValueKind::Temporal => SqlValue::Temporal(text),
        ValueKind::Bytes => SqlValue::Bytes(text.into_bytes()),
    }
}

/// Streams rows of a text-protocol result. Dropping it drains what is left.
struct MysqlCursor<'a> {
    result: QueryResult<'a, 'a, 'a, Text>,
    names: Vec<String>,
    kinds: Vec<ValueKind>,
}

impl<'a> MysqlCursor<'a> {
    fn open(conn: &'a mut Conn, sql: &str) -> Result<Self> {
        let result = conn.query_iter(sql)?;
        let columns: Vec<Column> = result.columns().as_ref().to_vec();
        let names = columns.iter().map(|c| c.name_str().into_owned()).collect();
        let kinds = columns
            .iter()
            .map(|c| classify_column(c.column_type(), c.flags()))
            .collect();
        Ok(Self {
            result,
            names,
            kinds,
        })
    }
}

impl Iterator for MysqlCursor<'_> {
    type Item = Result<Vec<SqlValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.result.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };
        let values = row
            .unwrap_raw()
            .into_iter()
            .zip(self.kinds.iter())
            .map(|(value, kind)| convert_value(*kind, value.unwrap_or(Value::NULL)))
            .collect();
        Some(Ok(values))
    }
}

impl RowCursor for MysqlCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.names
    }
}
