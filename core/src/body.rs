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

use bytes::Bytes;

/// The wire body of a request or response.
///
/// Bodies are tagged by how they were produced so that the client can pick
/// the right rendering and hashing strategy; every variant collapses to a
/// single contiguous buffer via [`Body::into_bytes`].
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body.
    Empty,
    /// A UTF-8 text body.
    Text(String),
    /// An opaque byte buffer.
    Bytes(Bytes),
    /// A JSON document, rendered on demand.
    Json(serde_json::Value),
    /// An already-rendered XML document.
    Xml(String),
}

impl Body {
    /// Whether the body carries no bytes.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(s) => s.is_empty(),
            Body::Bytes(b) => b.is_empty(),
            Body::Json(_) => false,
            Body::Xml(s) => s.is_empty(),
        }
    }

    /// Collapse the body into a single contiguous buffer.
    ///
    /// Rendering a [`Body::Json`] document is the only variant that does real
    /// work here; the others hand over their existing allocation.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Text(s) => Bytes::from(s),
            Body::Bytes(b) => b,
            Body::Json(v) => Bytes::from(serde_json::to_vec(&v).unwrap_or_default()),
            Body::Xml(s) => Bytes::from(s),
        }
    }

    /// Build a body from a raw buffer.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self {
        Body::Json(v)
    }
}
