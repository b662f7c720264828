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

//! # Stream Load Client
//!
//! Submits one bulk-columnar data file to `http://{endpoint}/api/{db}/{table}/_stream_load`.
//!
//! 1. **Redirects**: the frontend answers `307` with the backend node that
//!    owns the load. The identical request is reissued there exactly once and
//!    only that response counts.
//! 2. **Semantic failures**: a `200` whose JSON `Status` is `Fail` is final.
//!    Retrying cannot fix rejected data.
//! 3. **Transport failures**: connection errors and any other status are
//!    retried after a fixed pause, forever unless `max_retries` is set.

use crate::domain::errors::{DumpError, Result};
use crate::ports::bulk_load::{LoadMethod, LoadRequest, LoadResponse, LoadTransport};
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, EXPECT, LOCATION};
use reqwest::redirect::Policy;
use serde::Deserialize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_LOAD_PORT: u16 = 8030;

/// `LoadTransport` backed by a blocking `reqwest` client that never follows
/// redirects on its own.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl LoadTransport for ReqwestTransport {
    fn send(&self, request: &LoadRequest<'_>) -> Result<LoadResponse> {
        let builder = match request.method {
            LoadMethod::Put => self.client.put(&request.url),
            LoadMethod::Post => self.client.post(&request.url),
        };
        let mut builder = builder
            .basic_auth(request.user, Some(request.password))
            .header("columns", request.columns)
            .header(CONTENT_LENGTH, request.body.len());
        if request.strict_mode {
            builder = builder.header("strict_mode", "true");
        }
        if request.expect_continue {
            builder = builder.header(EXPECT, "100-continue");
        }

        let response = builder.body(request.body.to_vec()).send()?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;
        Ok(LoadResponse {
            status,
            location,
            body,
        })
    }
}

/// The JSON document returned by a stream load.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadOutcome {
    pub status: String,
    pub message: String,
    pub number_total_rows: u64,
    pub number_loaded_rows: u64,
    #[serde(rename = "ErrorURL")]
    pub error_url: String,
}

/// Options shared by every load of a restore run.
#[derive(Debug, Clone)]
pub struct StreamLoadOptions {
    pub user: String,
    pub password: String,
    pub method: LoadMethod,
    pub strict_mode: bool,
    pub expect_continue: bool,
    pub retry_interval: Duration,
    /// `None` retries transport failures forever.
    pub max_retries: Option<u32>,
}

pub struct StreamLoader {
    transport: Arc<dyn LoadTransport>,
    options: StreamLoadOptions,
}

/// Appends the default load port to an endpoint given without one.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_start_matches("http://");
    if endpoint.contains(':') {
        endpoint.to_string()
    } else {
        format!("{}:{}", endpoint, DEFAULT_LOAD_PORT)
    }
}

pub fn load_url(endpoint: &str, database: &str, table: &str) -> String {
    format!("http://{}/api/{}/{}/_stream_load", endpoint, database, table)
}

impl StreamLoader {
    pub fn new(transport: Arc<dyn LoadTransport>, options: StreamLoadOptions) -> Self {
        Self { transport, options }
    }

    /// One load attempt, following at most one `307` redirect.
    pub fn load(
        &self,
        endpoint: &str,
        database: &str,
        table: &str,
        header: &str,
        body: &[u8],
    ) -> Result<LoadOutcome> {
        let mut request = LoadRequest {
            method: self.options.method,
            url: load_url(endpoint, database, table),
            columns: header,
            body,
            user: &self.options.user,
            password: &self.options.password,
            strict_mode: self.options.strict_mode,
            expect_continue: self.options.expect_continue,
        };

        let mut response = self.transport.send(&request)?;
        if response.status == 307 {
            let location = response.location.take().ok_or_else(|| {
                DumpError::Http(format!("307 from {} without Location", request.url))
            })?;
            debug!("Stream load of {}.{} redirected to {}", database, table, location);
            request.url = location;
            response = self.transport.send(&request)?;
        }
        if response.status != 200 {
            return Err(DumpError::Http(format!(
                "stream load to {} returned status {}: {}",
                request.url, response.status, response.body
            )));
        }

        let outcome: LoadOutcome = serde_json::from_str(&response.body)?;
        if outcome.status == "Fail" {
            return Err(DumpError::LoadRejected {
                table: format!("{}.{}", database, table),
                message: outcome.message,
                error_url: outcome.error_url,
            });
        }
        if outcome.number_total_rows != outcome.number_loaded_rows {
            warn!(
                "Stream load of {}.{} loaded {} of {} rows ({}), see {}",
                database,
                table,
                outcome.number_loaded_rows,
                outcome.number_total_rows,
                outcome.message,
                outcome.error_url
            );
        }
        Ok(outcome)
    }

    /// Repeats [`StreamLoader::load`] until it succeeds or is rejected.
    pub fn load_with_retry(
        &self,
        endpoint: &str,
        database: &str,
        table: &str,
        header: &str,
        body: &[u8],
    ) -> Result<LoadOutcome> {
        let mut attempt: u32 = 0;
        loop {
            match self.load(endpoint, database, table, header, body) {
                Ok(outcome) => return Ok(outcome),
                Err(e @ DumpError::LoadRejected { .. }) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if self.options.max_retries.map_or(false, |max| attempt > max) {
                        return Err(e);
                    }
                    warn!(
                        "Stream load of {}.{} failed (attempt {}): {}, retrying in {:?}",
                        database, table, attempt, e, self.options.retry_interval
                    );
                    thread::sleep(self.options.retry_interval);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{load_ok, RecordingTransport};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    fn options() -> StreamLoadOptions {
        StreamLoadOptions {
            user: "root".into(),
            password: "secret".into(),
            method: LoadMethod::Put,
            strict_mode: true,
            expect_continue: true,
            retry_interval: Duration::from_millis(1),
            max_retries: None,
        }
    }

    fn redirect(to: &str) -> LoadResponse {
        LoadResponse {
            status: 307,
            location: Some(to.to_string()),
            body: String::new(),
        }
    }

    fn status(code: u16) -> LoadResponse {
        LoadResponse {
            status: code,
            location: None,
            body: "busy".into(),
        }
    }

    #[test]
    fn test_redirect_is_followed_once_with_identical_request() {
        let node2 = "http://node2:8040/api/shop/users/_stream_load";
        let transport = RecordingTransport::new(vec![Ok(redirect(node2))], load_ok(2, 2));
        let loader = StreamLoader::new(transport.clone(), options());

        let outcome = loader
            .load("fe:8030", "shop", "users", "`id`,`name`", b"1\ta\n2\tb")
            .unwrap();
        assert_eq!(outcome.number_loaded_rows, 2);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://fe:8030/api/shop/users/_stream_load");
        assert_eq!(requests[1].url, node2);
        assert_eq!(requests[0].body, requests[1].body);
        assert_eq!(requests[0].columns, requests[1].columns);
        assert_eq!(requests[1].method, LoadMethod::Put);
        assert_eq!(requests[1].user, "root");
        assert!(requests[1].strict_mode && requests[1].expect_continue);
    }

    #[test]
    fn test_only_the_redirected_response_counts() {
        let node2 = "http://node2:8040/api/shop/users/_stream_load";
        let transport =
            RecordingTransport::new(vec![Ok(redirect(node2)), Ok(status(500))], load_ok(1, 1));
        let loader = StreamLoader::new(transport.clone(), options());

        assert!(matches!(
            loader.load("fe:8030", "shop", "users", "`id`", b"1"),
            Err(DumpError::Http(_))
        ));

        // The retry starts over from the configured endpoint.
        loader
            .load_with_retry("fe:8030", "shop", "users", "`id`", b"1")
            .unwrap();
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].url, "http://fe:8030/api/shop/users/_stream_load");
    }

    #[test]
    fn test_fail_status_is_not_retried() {
        let rejected = LoadResponse {
            status: 200,
            location: None,
            body: r#"{"Status":"Fail","Message":"too many filtered rows","NumberTotalRows":3,"NumberLoadedRows":0,"ErrorURL":"http://be/err"}"#.into(),
        };
        let transport = RecordingTransport::new(vec![Ok(rejected)], load_ok(1, 1));
        let loader = StreamLoader::new(transport.clone(), options());

        match loader.load_with_retry("fe:8030", "shop", "users", "`id`", b"1") {
            Err(DumpError::LoadRejected { error_url, .. }) => {
                assert_eq!(error_url, "http://be/err")
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_transport_failures_are_retried_until_success() {
        let transport = RecordingTransport::new(
            vec![
                Err(DumpError::Http("connection refused".into())),
                Ok(status(503)),
            ],
            load_ok(4, 4),
        );
        let loader = StreamLoader::new(transport.clone(), options());

        let outcome = loader
            .load_with_retry("fe:8030", "shop", "users", "`id`", b"1\n2\n3\n4")
            .unwrap();
        assert_eq!(outcome.status, "Success");
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_max_retries_bounds_the_loop() {
        let transport = RecordingTransport::new(Vec::new(), status(500));
        let mut opts = options();
        opts.max_retries = Some(2);
        let loader = StreamLoader::new(transport.clone(), opts);

        assert!(loader
            .load_with_retry("fe:8030", "shop", "users", "`id`", b"1")
            .is_err());
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn test_partial_load_is_a_success() {
        let transport = RecordingTransport::new(vec![Ok(load_ok(3, 2))], load_ok(0, 0));
        let loader = StreamLoader::new(transport, options());
        let outcome = loader.load("fe:8030", "shop", "users", "`id`", b"1\n2\n3").unwrap();
        assert_eq!(outcome.number_total_rows, 3);
        assert_eq!(outcome.number_loaded_rows, 2);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("fe1"), "fe1:8030");
        assert_eq!(normalize_endpoint("http://fe1:9030"), "fe1:9030");
    }

    #[test]
    fn test_reqwest_transport_does_not_follow_redirects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                headers.push(line.trim_end().to_lowercase());
            }
            let len: usize = headers
                .iter()
                .find_map(|h| h.strip_prefix("content-length: ").map(|v| v.parse().unwrap()))
                .unwrap_or(0);
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            stream
                .write_all(
                    b"HTTP/1.1 307 Temporary Redirect\r\nLocation: http://node2/x\r\n\
                      Content-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .unwrap();
            (headers, String::from_utf8(body).unwrap())
        });

        let transport =
            ReqwestTransport::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        let url = format!("http://{}/api/shop/users/_stream_load", addr);
        let response = transport
            .send(&LoadRequest {
                method: LoadMethod::Put,
                url,
                columns: "`id`",
                body: b"1\n2",
                user: "root",
                password: "",
                strict_mode: true,
                expect_continue: false,
            })
            .unwrap();

        assert_eq!(response.status, 307);
        assert_eq!(response.location.as_deref(), Some("http://node2/x"));
        let (headers, body) = server.join().unwrap();
        assert!(headers[0].starts_with("put /api/shop/users/_stream_load"));
        assert!(headers.contains(&"columns: `id`".to_string()));
        assert!(headers.contains(&"strict_mode: true".to_string()));
        assert!(headers.iter().any(|h| h.starts_with("authorization: basic ")));
        assert_eq!(body, "1\n2");
    }
}
