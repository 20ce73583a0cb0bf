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

use http::Method;

/// Static description of one service operation, supplied by generated
/// bindings (or written by hand for ad-hoc calls).
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// The operation name, e.g. `HeadBucket`.
    pub name: &'static str,
    /// The HTTP method the operation uses.
    pub method: Method,
    /// The URI path template. `{name}` placeholders are substituted from the
    /// input's path params with slashes escaped; `{name+}` keeps slashes.
    pub path: &'static str,
    /// Whether the output attaches the raw response body instead of
    /// decoding it.
    pub raw_payload: bool,
}

impl OperationDescriptor {
    /// Describe an operation.
    pub fn new(name: &'static str, method: Method, path: &'static str) -> Self {
        Self {
            name,
            method,
            path,
            raw_payload: false,
        }
    }

    /// Mark the output as a raw payload.
    pub fn with_raw_payload(mut self) -> Self {
        self.raw_payload = true;
        self
    }
}
