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

//! # Bulk Load Port
//!
//! The contract for the "Data Sender" of a bulk-columnar restore: send one
//! stream-load request and report the raw HTTP outcome. Redirect following,
//! response interpretation and retries live above this port, so the transport
//! stays a thin wrapper around an HTTP client.

use crate::domain::errors::Result;
use serde::{Deserialize, Serialize};

/// HTTP verb used for stream load; older endpoints accept `PUT`, newer ones `POST`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadMethod {
    #[default]
    Put,
    Post,
}

/// One stream-load request. Everything except the URL is borrowed so a
/// redirect can reissue the identical request cheaply.
#[derive(Debug, Clone)]
pub struct LoadRequest<'a> {
    pub method: LoadMethod,
    pub url: String,
    /// The `columns` header: the header line of the data file.
    pub columns: &'a str,
    /// Delimited rows, passed through as read from the data file.
    pub body: &'a [u8],
    pub user: &'a str,
    pub password: &'a str,
    pub strict_mode: bool,
    pub expect_continue: bool,
}

/// The raw HTTP outcome of a request; redirects are never followed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

/// Sends a single stream-load request.
pub trait LoadTransport: Send + Sync {
    fn send(&self, request: &LoadRequest<'_>) -> Result<LoadResponse>;
}
