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

//! Tokio-based file reading implementation for awsreq.
//!
//! This crate provides [`TokioFileRead`], an async file reader that
//! implements the `FileRead` trait from `awsreq_core` using Tokio's file
//! system operations. It is the default way to load the shared credential
//! and config files from disk.
//!
//! ## Example
//!
//! ```no_run
//! use awsreq_core::FileRead;
//! use awsreq_file_read_tokio::TokioFileRead;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let content = TokioFileRead.file_read("/path/to/credentials").await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Context as _;
use async_trait::async_trait;
use awsreq_core::FileRead;

/// Tokio-based implementation of the `FileRead` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileRead;

#[async_trait]
impl FileRead for TokioFileRead {
    async fn file_read(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read file: {path}"))
    }
}
