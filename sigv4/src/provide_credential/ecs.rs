// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::constants::AWS_CONTAINER_CREDENTIALS_RELATIVE_URI;
use crate::Credential;
use async_trait::async_trait;
use awsreq_core::time::parse_rfc3339;
use awsreq_core::{Context, Error, ProvideCredential, Result};
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

const ECS_METADATA_ENDPOINT: &str = "http://169.254.170.2";

/// The metadata endpoint answers from a link-local address, so a short
/// timeout is enough and keeps a misconfigured chain from stalling.
const ECS_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// EcsCredentialProvider fetches task IAM credentials from the ECS container
/// credentials endpoint.
///
/// The endpoint is discovered through the
/// `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` environment variable that the
/// ECS agent injects into every container with a task role. When the
/// variable is absent the provider yields no credential and the chain moves
/// on.
#[derive(Debug, Clone, Default)]
pub struct EcsCredentialProvider {
    relative_uri: Option<String>,
    endpoint_override: Option<String>,
}

impl EcsCredentialProvider {
    /// Create a new ECS credential provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container credentials relative URI, overriding the environment.
    pub fn with_relative_uri(mut self, uri: impl Into<String>) -> Self {
        self.relative_uri = Some(uri.into());
        self
    }

    /// Override the metadata base endpoint (typically for testing).
    ///
    /// Defaults to `http://169.254.170.2` if not specified.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self, ctx: &Context) -> Option<String> {
        let relative_uri = self
            .relative_uri
            .clone()
            .or_else(|| ctx.env_var(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI))?;

        let base = self
            .endpoint_override
            .as_deref()
            .unwrap_or(ECS_METADATA_ENDPOINT);
        Some(format!("{base}{relative_uri}"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EcsCredentialResponse {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,
}

#[async_trait]
impl ProvideCredential for EcsCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let Some(endpoint) = self.endpoint(ctx) else {
            debug!("ecs credential provider: no container credentials endpoint configured");
            return Ok(None);
        };

        debug!("ecs credential provider: fetching credentials from {endpoint}");

        let req = Request::builder()
            .method(Method::GET)
            .uri(&endpoint)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build ECS credentials request")
                    .with_source(e)
                    .with_context(format!("endpoint: {endpoint}"))
            })?;

        let resp = tokio::time::timeout(ECS_REQUEST_TIMEOUT, ctx.http_send(req))
            .await
            .map_err(|_| {
                Error::unexpected("ECS credentials request timed out")
                    .with_context(format!("endpoint: {endpoint}"))
                    .set_retryable(true)
            })?
            .map_err(|e| {
                Error::unexpected("failed to fetch ECS credentials")
                    .with_source(e)
                    .with_context(format!("endpoint: {endpoint}"))
                    .set_retryable(true)
            })?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = String::from_utf8_lossy(resp.body()).to_string();

            let error = match status.as_u16() {
                401 | 403 => Error::credential_denied(format!(
                    "ECS task not authorized to fetch credentials: {body}"
                )),
                500..=599 => {
                    Error::unexpected(format!("ECS metadata service error: {body}"))
                        .set_retryable(true)
                }
                _ => Error::unexpected(format!(
                    "ECS metadata endpoint returned unexpected status {status}: {body}"
                )),
            };

            return Err(error.with_context(format!("endpoint: {endpoint}")));
        }

        let body = resp.into_body();
        let creds: EcsCredentialResponse = serde_json::from_slice(&body).map_err(|e| {
            Error::unexpected("failed to parse ECS credentials response")
                .with_source(e)
                .with_context(format!("endpoint: {endpoint}"))
        })?;

        let expires_in = parse_rfc3339(&creds.expiration)?;

        Ok(Some(Credential {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: Some(creds.token),
            expires_in: Some(expires_in),
        }))
    }
}
