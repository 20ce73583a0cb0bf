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

use crate::Error;
use bytes::Bytes;
use std::fmt::Debug;

/// Per-request metadata threaded through middlewares and logs.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// The service name the request targets.
    pub service: String,
    /// The operation being executed.
    pub operation: &'static str,
    /// The process-monotone request id.
    pub request_id: u64,
}

/// An ordered request/response transformer.
///
/// Middlewares run in configuration order for requests, before signing, and
/// in reverse order for responses, before decoding. The first failure aborts
/// the exchange with that error.
///
/// A middleware must not mutate headers the signer owns (`Authorization`,
/// `X-Amz-Date`, `host`, `x-amz-content-sha256`); the chain runs before
/// signing and nothing may invalidate the signature afterwards.
pub trait Middleware: Debug + Send + Sync {
    /// Transform an outgoing request.
    fn chain_request(
        &self,
        _req: &mut http::Request<Bytes>,
        _ctx: &OperationContext,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Transform an incoming response.
    fn chain_response(
        &self,
        _resp: &mut http::Response<Bytes>,
        _ctx: &OperationContext,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Run the chain over an outgoing request, in configuration order.
pub(crate) fn apply_request_chain(
    middlewares: &[std::sync::Arc<dyn Middleware>],
    req: &mut http::Request<Bytes>,
    ctx: &OperationContext,
) -> Result<(), Error> {
    for middleware in middlewares {
        middleware.chain_request(req, ctx)?;
    }
    Ok(())
}

/// Run the chain over an incoming response, in reverse order.
pub(crate) fn apply_response_chain(
    middlewares: &[std::sync::Arc<dyn Middleware>],
    resp: &mut http::Response<Bytes>,
    ctx: &OperationContext,
) -> Result<(), Error> {
    for middleware in middlewares.iter().rev() {
        middleware.chain_response(resp, ctx)?;
    }
    Ok(())
}
