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

//! Generic AWS service client runtime for awsreq.
//!
//! This crate turns a typed operation description into a signed HTTPS
//! request, dispatches it through the shared transport, decodes the response
//! for one of the AWS wire dialects, and retries transient failures.
//!
//! The per-service bindings (operation catalogs and shape definitions) are
//! external collaborators: they supply an [`OperationDescriptor`] plus types
//! implementing [`RequestShape`] and [`ResponseShape`], and this crate does
//! the rest.
//!
//! ## Overview
//!
//! ```no_run
//! use awsreq_client::{AwsClient, OperationDescriptor, Protocol, ServiceConfig};
//! use awsreq_core::Context;
//! use awsreq_sigv4::DefaultCredentialProvider;
//!
//! # #[derive(Debug, serde::Serialize, serde::Deserialize)]
//! # struct Output {}
//! # impl awsreq_client::ResponseShape for Output {}
//! # async fn example(ctx: Context) -> Result<(), awsreq_client::Error> {
//! let client = AwsClient::new(ctx, DefaultCredentialProvider::new());
//! let config = ServiceConfig::builder("s3", "us-east-1", Protocol::RestXml, "2006-03-01")
//!     .build()?;
//! let op = OperationDescriptor::new("HeadBucket", http::Method::HEAD, "/{Bucket}");
//! let out: Output = client.execute_empty(&op, &config).await?;
//! # client.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! Dialect handling, error decoding, middleware ordering, and retry
//! scheduling all live here; signing and credentials come from
//! `awsreq_sigv4`.

mod error;
pub use error::{ClientErrorCode, Error, ServerErrorCode, ServiceError, ServiceErrorKind};

mod config;
pub use config::{default_region, Partition, Protocol, ServiceConfig, ServiceConfigBuilder};

mod operation;
pub use operation::OperationDescriptor;

mod shape;
pub use shape::{FormValue, RequestShape, ResponseShape};

mod build;
pub use build::build_request;

mod decode;
pub use decode::{decode_error, decode_response};

mod middleware;
pub use middleware::{Middleware, OperationContext};

mod retry;
pub use retry::{ExponentialRetry, JitterRetry, NoRetry, RetryAction, RetryPolicy};

mod client;
pub use client::AwsClient;

mod waiter;
pub use waiter::{Acceptor, AcceptorState, Matcher, Waiter, WaiterOptions};

pub mod testing;
