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

use crate::middleware::{apply_request_chain, apply_response_chain};
use crate::{
    build_request, decode_error, decode_response, Error, JitterRetry, OperationContext,
    OperationDescriptor, RequestShape, ResponseShape, RetryAction, RetryPolicy, ServiceConfig,
};
use awsreq_core::hash::hex_sha256;
use awsreq_core::{Context, ProvideCredential, SignRequest};
use awsreq_sigv4::{CachedCredentialProvider, Credential, RequestSigner};
use bytes::Bytes;
use http::HeaderValue;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// The client orchestrator.
///
/// Owns the credential cache and retry policy, and drives every operation
/// through the same pipeline: fetch credential, build, run request
/// middlewares, hash and sign, dispatch with retries, run response
/// middlewares, decode.
///
/// The underlying transport and file reader are injected through the
/// [`Context`]; the client never manages their lifecycle. Call
/// [`AwsClient::shutdown`] before dropping.
#[derive(Debug)]
pub struct AwsClient {
    ctx: Context,
    credentials: Arc<CachedCredentialProvider>,
    retry_policy: Arc<dyn RetryPolicy>,
    request_count: AtomicU64,
    is_shutdown: AtomicBool,
}

/// Input stand-in for operations without an input shape.
#[derive(Debug, Serialize)]
struct NoInput;

impl RequestShape for NoInput {}

impl AwsClient {
    /// Create a client over the given context and credential source.
    ///
    /// The provider is wrapped in a [`CachedCredentialProvider`], so repeated
    /// operations share one cached credential and refreshes are
    /// singleflighted.
    pub fn new(
        ctx: Context,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        Self {
            ctx,
            credentials: Arc::new(CachedCredentialProvider::new(provider)),
            retry_policy: Arc::new(JitterRetry::default()),
            request_count: AtomicU64::new(0),
            is_shutdown: AtomicBool::new(false),
        }
    }

    /// Replace the default jittered retry policy.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// The context this client dispatches through.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Execute an operation without an input shape.
    pub async fn execute_empty<O: ResponseShape>(
        &self,
        op: &OperationDescriptor,
        config: &ServiceConfig,
    ) -> Result<O, Error> {
        self.execute::<NoInput, O>(op, config, None).await
    }

    /// Execute an operation.
    ///
    /// Returns the decoded output shape on success. Transient transport
    /// failures, 5xx responses, and 429 throttles are retried under the
    /// configured policy; everything else surfaces immediately.
    pub async fn execute<I: RequestShape, O: ResponseShape>(
        &self,
        op: &OperationDescriptor,
        config: &ServiceConfig,
        input: Option<&I>,
    ) -> Result<O, Error> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(Error::AlreadyShutdown);
        }

        let request_id = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        let op_ctx = OperationContext {
            service: config.service_name().to_string(),
            operation: op.name,
            request_id,
        };

        let started = Instant::now();
        let result = self.execute_inner(op, config, input, &op_ctx).await;

        let service = op_ctx.service.clone();
        counter!("aws_requests_total", "service" => service.clone(), "operation" => op.name)
            .increment(1);
        histogram!("aws_request_duration", "service" => service.clone(), "operation" => op.name)
            .record(started.elapsed().as_secs_f64());
        if result.is_err() {
            counter!("aws_request_errors", "service" => service, "operation" => op.name)
                .increment(1);
        }

        result
    }

    async fn execute_inner<I: RequestShape, O: ResponseShape>(
        &self,
        op: &OperationDescriptor,
        config: &ServiceConfig,
        input: Option<&I>,
        op_ctx: &OperationContext,
    ) -> Result<O, Error> {
        let cred = self
            .credentials
            .provide_credential(&self.ctx)
            .await
            .map_err(|e| Error::Credential {
                message: "credential resolution failed".to_string(),
                source: Some(e.into()),
            })?
            .ok_or_else(|| Error::Credential {
                message: "every provider in the chain failed to supply credentials".to_string(),
                source: None,
            })?;

        let req = build_request(op, config, input)?;
        let (parts, body) = req.into_parts();

        // Rendering the body is the CPU-bound part of the pipeline; it runs
        // on the blocking pool.
        let body = tokio::task::spawn_blocking(move || body.into_bytes())
            .await
            .map_err(|e| Error::Transport {
                message: "body encoding task failed".to_string(),
                transient: false,
                source: Some(e.into()),
            })?;

        let mut req = http::Request::from_parts(parts, body);
        apply_request_chain(config.middlewares(), &mut req, op_ctx)?;

        let (mut parts, body) = req.into_parts();

        // Payload hash policy: s3 ships unsigned payloads, everything else
        // signs the SHA-256 of the body. An explicit header wins.
        if !parts.headers.contains_key(X_AMZ_CONTENT_SHA_256) {
            let hash = if config.service_name() == "s3" {
                UNSIGNED_PAYLOAD.to_string()
            } else {
                hex_sha256(&body)
            };
            parts.headers.insert(
                X_AMZ_CONTENT_SHA_256,
                HeaderValue::from_str(&hash).map_err(awsreq_core::Error::from)?,
            );
        }
        if !parts.headers.contains_key(http::header::USER_AGENT) {
            parts.headers.insert(
                http::header::USER_AGENT,
                HeaderValue::from_static(concat!("awsreq/", env!("CARGO_PKG_VERSION"))),
            );
        }

        let signer = RequestSigner::new(config.signing_name(), config.region());
        signer
            .sign_request(&self.ctx, &mut parts, Some(&cred), None)
            .await?;

        let mut attempt: u32 = 0;
        loop {
            let req = clone_request(&parts, &body);
            let outcome = self.dispatch(req, config.timeout()).await;

            let error = match outcome {
                Ok(resp) if resp.status().is_success() => {
                    let mut resp = resp;
                    apply_response_chain(config.middlewares(), &mut resp, op_ctx)?;
                    return decode_response(op, config, resp);
                }
                Ok(resp) => {
                    // Classification only needs the status; the full error
                    // document is decoded when we give up.
                    let provisional = provisional_status_error(resp.status().as_u16());
                    match self.retry_policy.retry_wait_time(&provisional, attempt) {
                        RetryAction::Retry(delay) => {
                            self.log_retry(op_ctx, attempt, delay, &provisional);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                        RetryAction::DontRetry => decode_error(config, resp),
                    }
                }
                Err(err) => match self.retry_policy.retry_wait_time(&err, attempt) {
                    RetryAction::Retry(delay) => {
                        self.log_retry(op_ctx, attempt, delay, &err);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    RetryAction::DontRetry => err,
                },
            };

            log::error!(
                "request failed (aws-service={}, aws-operation={}, aws-request-id={}): {error}",
                op_ctx.service,
                op_ctx.operation,
                op_ctx.request_id,
            );
            return Err(error);
        }
    }

    async fn dispatch(
        &self,
        req: http::Request<Bytes>,
        timeout: Duration,
    ) -> Result<http::Response<Bytes>, Error> {
        match tokio::time::timeout(timeout, self.ctx.http_send(req)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(Error::Transport {
                message: format!("request dispatch failed: {e}"),
                transient: true,
                source: Some(e),
            }),
            Err(_) => Err(Error::Transport {
                message: format!("request timed out after {timeout:?}"),
                transient: true,
                source: None,
            }),
        }
    }

    fn log_retry(
        &self,
        op_ctx: &OperationContext,
        attempt: u32,
        delay: Duration,
        error: &Error,
    ) {
        log::info!(
            "retrying request (aws-service={}, aws-operation={}, aws-request-id={}): \
             attempt {attempt} failed with {error}, next attempt in {delay:?}",
            op_ctx.service,
            op_ctx.operation,
            op_ctx.request_id,
        );
    }

    /// Release the client.
    ///
    /// Idempotent-safe: the first call succeeds, any further call reports
    /// [`Error::AlreadyShutdown`]. Injected transports are left untouched;
    /// their owner tears them down.
    pub fn shutdown(&self) -> Result<(), Error> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyShutdown);
        }
        Ok(())
    }
}

impl Drop for AwsClient {
    fn drop(&mut self) {
        // Dropping a live client is a contract violation.
        debug_assert!(
            self.is_shutdown.load(Ordering::SeqCst),
            "AwsClient dropped without shutdown"
        );
    }
}

fn clone_request(parts: &http::request::Parts, body: &Bytes) -> http::Request<Bytes> {
    let mut req = http::Request::new(body.clone());
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.headers_mut() = parts.headers.clone();
    req
}

fn provisional_status_error(status: u16) -> Error {
    Error::Service(crate::ServiceError {
        status,
        code: String::new(),
        message: String::new(),
        kind: crate::ServiceErrorKind::Generic,
        raw_body: None,
    })
}
