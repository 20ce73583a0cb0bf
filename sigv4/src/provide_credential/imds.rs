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

use crate::constants::AWS_EC2_METADATA_DISABLED;
use crate::Credential;
use async_trait::async_trait;
use awsreq_core::time::{now, parse_rfc3339, DateTime};
use awsreq_core::{Context, Error, ProvideCredential, Result};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::Method;
use log::debug;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const X_AWS_EC2_METADATA_TOKEN: &str = "x-aws-ec2-metadata-token";
const X_AWS_EC2_METADATA_TOKEN_TTL_SECONDS: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// ImdsCredentialProvider fetches instance role credentials from the EC2
/// instance metadata service.
///
/// The provider speaks IMDSv2: it first obtains a session token with a
/// `PUT /latest/api/token` request and sends it with every metadata read. If
/// the token request fails for any reason (403 on instances with a hop limit
/// of one behind a proxy, old IMDS versions, ...), the provider degrades to
/// IMDSv1 and retries the sequence without the token header.
#[derive(Debug, Clone)]
pub struct ImdsCredentialProvider {
    disabled: Option<bool>,
    endpoint_override: Option<String>,
    token: Arc<Mutex<(String, DateTime)>>,
}

impl Default for ImdsCredentialProvider {
    fn default() -> Self {
        Self {
            disabled: None,
            endpoint_override: None,
            token: Arc::new(Mutex::new((String::new(), DateTime::default()))),
        }
    }
}

impl ImdsCredentialProvider {
    /// Create a new `ImdsCredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable the provider.
    pub fn disabled(mut self) -> Self {
        self.disabled = Some(true);
        self
    }

    /// Override the metadata endpoint (typically for testing).
    ///
    /// Defaults to `http://169.254.169.254` if not specified.
    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self, ctx: &Context) -> String {
        self.endpoint_override
            .clone()
            .or_else(|| ctx.env_var("AWS_EC2_METADATA_SERVICE_ENDPOINT"))
            .unwrap_or_else(|| IMDS_ENDPOINT.into())
    }

    /// Obtain an IMDSv2 session token, or `None` to fall back to IMDSv1.
    async fn load_metadata_token(&self, ctx: &Context) -> Option<String> {
        {
            let (token, expires_in) = self.token.lock().expect("lock poisoned").clone();
            if expires_in > now() {
                return Some(token);
            }
        }

        let endpoint = self.endpoint(ctx);
        let url = format!("{endpoint}/latest/api/token");
        let req = http::Request::builder()
            .uri(url)
            .method(Method::PUT)
            .header(CONTENT_LENGTH, "0")
            // 21600s (6h) is recommended by AWS.
            .header(X_AWS_EC2_METADATA_TOKEN_TTL_SECONDS, "21600")
            .body(Bytes::new())
            .ok()?;

        let resp = match ctx.http_send_as_string(req).await {
            Ok(resp) => resp,
            Err(err) => {
                debug!("imds token request failed, falling back to IMDSv1: {err:?}");
                return None;
            }
        };
        if resp.status() != http::StatusCode::OK {
            debug!(
                "imds token request returned {}, falling back to IMDSv1",
                resp.status()
            );
            return None;
        }

        let token = resp.into_body();
        // Refresh the cached token 10 minutes before the TTL runs out.
        let expires_in = now() + chrono::TimeDelta::try_seconds(21600 - 600).expect("in bounds");

        {
            *self.token.lock().expect("lock poisoned") = (token.clone(), expires_in);
        }

        Some(token)
    }

    async fn fetch(&self, ctx: &Context, url: &str, token: Option<&str>) -> Result<String> {
        let mut req = http::Request::builder().uri(url).method(Method::GET);
        if let Some(token) = token {
            req = req.header(X_AWS_EC2_METADATA_TOKEN, token);
        }
        let req = req
            .body(Bytes::new())
            .map_err(|e| Error::unexpected("failed to build metadata request").with_source(e))?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("request to EC2 metadata service failed")
                .with_source(e)
                .with_context(format!("url: {url}"))
                .set_retryable(true)
        })?;
        if resp.status() != http::StatusCode::OK {
            return Err(Error::unexpected(format!(
                "request to EC2 metadata service failed: {} {}",
                resp.status(),
                resp.body()
            ))
            .with_context(format!("url: {url}")));
        }

        Ok(resp.into_body())
    }
}

#[async_trait]
impl ProvideCredential for ImdsCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        // Check if disabled, first from config, then from environment
        let disabled = self.disabled.unwrap_or_else(|| {
            ctx.env_var(AWS_EC2_METADATA_DISABLED)
                .map(|v| v == "true")
                .unwrap_or(false)
        });

        if disabled {
            return Ok(None);
        }

        let token = self.load_metadata_token(ctx).await;
        let endpoint = self.endpoint(ctx);

        // List the roles attached to this instance; the body is the role name.
        let url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
        let role_name = self.fetch(ctx, &url, token.as_deref()).await?;

        // Fetch the credential document for the role.
        let url = format!("{endpoint}/latest/meta-data/iam/security-credentials/{role_name}");
        let content = self.fetch(ctx, &url, token.as_deref()).await?;

        let resp: InstanceIamSecurityCredentials = serde_json::from_str(&content)
            .map_err(|e| Error::unexpected("failed to parse IMDS response").with_source(e))?;
        if resp.code == "AssumeRoleUnauthorizedAccess" {
            return Err(Error::credential_denied(format!(
                "Incorrect IMDS/IAM configuration: [{}] {}. \
                        Hint: Does this role have a trust relationship with EC2?",
                resp.code, resp.message
            )));
        }
        if resp.code != "Success" {
            return Err(Error::credential_invalid(format!(
                "Error retrieving credentials from IMDS: {} {}",
                resp.code, resp.message
            )));
        }

        let cred = Credential {
            access_key_id: resp.access_key_id,
            secret_access_key: resp.secret_access_key,
            session_token: Some(resp.token),
            expires_in: Some(parse_rfc3339(&resp.expiration)?),
        };

        Ok(Some(cred))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InstanceIamSecurityCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use awsreq_core::StaticEnv;
    use awsreq_file_read_tokio::TokioFileRead;
    use awsreq_http_send_reqwest::ReqwestHttpSend;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_disabled_via_env() {
        let ctx = Context::new(TokioFileRead, ReqwestHttpSend::default()).with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::from([(AWS_EC2_METADATA_DISABLED.to_string(), "true".to_string())]),
        });

        let provider = ImdsCredentialProvider::new();
        let cred = provider.provide_credential(&ctx).await.unwrap();
        assert!(cred.is_none());
    }

    #[tokio::test]
    async fn test_disabled_via_builder() {
        let ctx = Context::new(TokioFileRead, ReqwestHttpSend::default()).with_env(StaticEnv {
            home_dir: None,
            envs: HashMap::new(),
        });

        let provider = ImdsCredentialProvider::new().disabled();
        let cred = provider.provide_credential(&ctx).await.unwrap();
        assert!(cred.is_none());
    }
}
