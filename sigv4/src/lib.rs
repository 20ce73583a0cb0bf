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

//! AWS Signature Version 4 signing and credential loading for awsreq.
//!
//! This crate implements the complete SigV4 signing algorithm along with
//! credential loading from the standard sources: environment variables, the
//! shared credential/config files, the ECS container metadata endpoint, and
//! the EC2 instance metadata service (IMDSv2 with IMDSv1 fallback).
//!
//! ## Quick Start
//!
//! ```no_run
//! use awsreq_core::{Context, ProvideCredential, SignRequest};
//! use awsreq_sigv4::{DefaultCredentialProvider, RequestSigner};
//!
//! # async fn example(ctx: Context) -> awsreq_core::Result<()> {
//! let loader = DefaultCredentialProvider::new();
//! let cred = loader.provide_credential(&ctx).await?;
//!
//! let signer = RequestSigner::new("s3", "us-east-1");
//! let mut parts = http::Request::get("https://s3.us-east-1.amazonaws.com/bucket")
//!     .body(())
//!     .unwrap()
//!     .into_parts()
//!     .0;
//! signer.sign_request(&ctx, &mut parts, cred.as_ref(), None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Credential Sources
//!
//! 1. **Static**: explicitly configured access key and secret
//! 2. **Environment**: `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`
//! 3. **Shared files**: `~/.aws/credentials` and `~/.aws/config`
//! 4. **ECS**: container credentials via
//!    `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`
//! 5. **EC2 IMDS**: instance role credentials, IMDSv2 first
//!
//! Wrap any provider in [`CachedCredentialProvider`] to get expiry-aware
//! caching with singleflight refresh.

mod constants;
pub use constants::EMPTY_STRING_SHA256;

mod credential;
pub use credential::Credential;
mod signer;
pub use signer::RequestSigner;
mod provide_credential;
pub use provide_credential::*;
