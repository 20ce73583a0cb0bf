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

//! Core components for the awsreq AWS client runtime.
//!
//! This crate provides the foundational types shared by the signing and
//! client crates. It defines the abstractions that keep the runtime free of
//! global state and testable without a network:
//!
//! - **Context**: a container holding implementations for file reading, HTTP
//!   sending, and environment access
//! - **Traits**: abstract interfaces for credential loading
//!   ([`ProvideCredential`]) and request signing ([`SignRequest`])
//! - **Body**: the wire body model shared by request building, hashing, and
//!   response decoding
//!
//! ## Traits
//!
//! - [`FileRead`]: asynchronous file reading
//! - [`HttpSend`]: sending HTTP requests
//! - [`Env`]: environment variable access
//! - [`ProvideCredential`]: loading credentials from various sources
//! - [`SignRequest`]: building service-specific signing requests
//! - [`SigningCredential`]: validating credentials
//!
//! ## Utilities
//!
//! - [`hash`]: cryptographic hashing utilities
//! - [`time`]: time formatting for signing
//! - [`utils`]: general utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

/// Error types for awsreq operations
pub mod error;
pub mod hash;
pub mod time;
pub mod utils;

pub use error::{Error, ErrorKind, Result};

mod env;
pub use env::{Env, OsEnv, StaticEnv};
mod fs;
pub use fs::FileRead;
mod http_send;
pub use http_send::HttpSend;
mod context;
pub use context::Context;

mod api;
pub use api::{ProvideCredential, ProvideCredentialChain, SignRequest, SigningCredential};
mod request;
pub use request::SigningRequest;
mod body;
pub use body::Body;
