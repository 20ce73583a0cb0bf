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

//! Credential provider tests against the in-process fixture server.

use awsreq_client::testing::FixtureServer;
use awsreq_core::time::{format_iso8601, now};
use awsreq_core::{Context, ProvideCredential};
use awsreq_file_read_tokio::TokioFileRead;
use awsreq_http_send_reqwest::ReqwestHttpSend;
use awsreq_sigv4::{CachedCredentialProvider, EcsCredentialProvider, ImdsCredentialProvider};
use bytes::Bytes;
use http::{Method, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn test_context() -> Context {
    Context::new(TokioFileRead, ReqwestHttpSend::default())
}

fn rfc3339_in_one_hour() -> String {
    let t = now() + chrono::TimeDelta::try_hours(1).unwrap();
    // RFC 3339 extended form, as the metadata endpoints emit it.
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[tokio::test]
async fn test_ecs_provider_parses_documented_body() {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = FixtureServer::bind().await.unwrap();
    let endpoint = server.uri();
    let expiration = rfc3339_in_one_hour();

    let expiration_on_server = expiration.clone();
    let server_task = tokio::spawn(async move {
        server
            .process(move |req| {
                assert_eq!(req.method(), Method::GET);
                assert_eq!(req.uri().path(), "/foo");
                let body = format!(
                    "{{\"AccessKeyId\":\"ACCESS_KEY_ID\",\
                      \"SecretAccessKey\":\"SECRET_ACCESS_KEY\",\
                      \"Token\":\"SECURITY_TOKEN_STRING\",\
                      \"Expiration\":\"{expiration_on_server}\"}}"
                );
                Ok(Response::builder()
                    .status(200)
                    .body(Bytes::from(body))
                    .unwrap())
            })
            .await
            .unwrap();
    });

    let provider = EcsCredentialProvider::new()
        .with_relative_uri("/foo")
        .with_endpoint_override(endpoint);

    let cred = provider
        .provide_credential(&test_context())
        .await
        .unwrap()
        .expect("credential must be returned");

    assert_eq!(cred.access_key_id, "ACCESS_KEY_ID");
    assert_eq!(cred.secret_access_key, "SECRET_ACCESS_KEY");
    assert_eq!(cred.session_token.as_deref(), Some("SECURITY_TOKEN_STRING"));
    let expires_in = cred.expires_in.expect("expiration parsed");
    assert_eq!(format_iso8601(expires_in), {
        let t = awsreq_core::time::parse_rfc3339(&expiration).unwrap();
        format_iso8601(t)
    });

    server_task.await.unwrap();
}

#[tokio::test]
async fn test_imds_v1_fallback_and_cache() {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = FixtureServer::bind().await.unwrap();
    let endpoint = server.uri();
    let requests = Arc::new(AtomicUsize::new(0));
    let expiration = rfc3339_in_one_hour();

    let requests_on_server = requests.clone();
    let server_task = tokio::spawn(async move {
        let step = AtomicUsize::new(0);
        server
            .process_many(3, move |req| {
                requests_on_server.fetch_add(1, Ordering::SeqCst);
                match step.fetch_add(1, Ordering::SeqCst) {
                    // IMDSv2 token request is rejected.
                    0 => {
                        assert_eq!(req.method(), Method::PUT);
                        assert_eq!(req.uri().path(), "/latest/api/token");
                        Ok(Response::builder()
                            .status(403)
                            .body(Bytes::new())
                            .unwrap())
                    }
                    // Role listing must retry without the token header.
                    1 => {
                        assert_eq!(req.method(), Method::GET);
                        assert_eq!(
                            req.uri().path(),
                            "/latest/meta-data/iam/security-credentials/"
                        );
                        assert!(!req.headers().contains_key("x-aws-ec2-metadata-token"));
                        Ok(Response::builder()
                            .status(200)
                            .body(Bytes::from_static(b"my-instance-role"))
                            .unwrap())
                    }
                    // Role document, still tokenless.
                    _ => {
                        assert_eq!(
                            req.uri().path(),
                            "/latest/meta-data/iam/security-credentials/my-instance-role"
                        );
                        assert!(!req.headers().contains_key("x-aws-ec2-metadata-token"));
                        let body = format!(
                            "{{\"Code\":\"Success\",\"Message\":\"\",\
                              \"AccessKeyId\":\"ROLE_ACCESS_KEY\",\
                              \"SecretAccessKey\":\"ROLE_SECRET_KEY\",\
                              \"Token\":\"ROLE_TOKEN\",\
                              \"Expiration\":\"{expiration}\"}}"
                        );
                        Ok(Response::builder()
                            .status(200)
                            .body(Bytes::from(body))
                            .unwrap())
                    }
                }
            })
            .await
            .unwrap();
    });

    let provider = CachedCredentialProvider::new(
        ImdsCredentialProvider::new().with_endpoint_override(endpoint),
    );
    let ctx = test_context();

    let cred = provider
        .provide_credential(&ctx)
        .await
        .unwrap()
        .expect("credential must be returned");
    assert_eq!(cred.access_key_id, "ROLE_ACCESS_KEY");
    assert_eq!(cred.secret_access_key, "ROLE_SECRET_KEY");
    assert_eq!(cred.session_token.as_deref(), Some("ROLE_TOKEN"));

    server_task.await.unwrap();
    assert_eq!(requests.load(Ordering::SeqCst), 3);

    // A second call inside the freshness window is served from the cache:
    // the server is no longer accepting, so any request would fail.
    let cred = provider
        .provide_credential(&ctx)
        .await
        .unwrap()
        .expect("cached credential");
    assert_eq!(cred.access_key_id, "ROLE_ACCESS_KEY");
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}
