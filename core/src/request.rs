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

use crate::{Error, Result};
use http::request::Parts;
use http::uri::{Authority, Scheme};
use http::{HeaderMap, HeaderValue, Method, Uri};

/// A mutable snapshot of the parts of a request that take part in signing.
///
/// Signers canonicalize against this snapshot (normalizing header values,
/// inserting the signing headers, sorting and encoding the query) and then
/// write the finished snapshot back with [`SigningRequest::apply`]. The
/// original request is untouched until `apply`, so a failed signing attempt
/// never leaves a half-mutated request behind.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// Decoded query pairs, in their order on the wire.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Snapshot the signable parts of a request.
    ///
    /// The query string is split into decoded pairs; signers re-encode it
    /// during canonicalization. A request without an authority cannot be
    /// signed, since the `host` header derives from it.
    pub fn build(parts: &Parts) -> Result<Self> {
        let authority = parts
            .uri
            .authority()
            .cloned()
            .ok_or_else(|| Error::request_invalid("cannot sign a request without an authority"))?;

        let query = parts
            .uri
            .query()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: parts.uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers.clone(),
        })
    }

    /// Write the snapshot back onto the request.
    ///
    /// Consumes the snapshot; the request's URI and headers are replaced
    /// wholesale with the canonicalized ones.
    pub fn apply(self, parts: &mut Parts) -> Result<()> {
        let mut target = self.path;
        for (i, (k, v)) in self.query.iter().enumerate() {
            target.push(if i == 0 { '?' } else { '&' });
            target.push_str(k);
            if !v.is_empty() {
                target.push('=');
                target.push_str(v);
            }
        }

        parts.uri = Uri::builder()
            .scheme(self.scheme)
            .authority(self.authority)
            .path_and_query(target)
            .build()?;
        parts.headers = self.headers;

        Ok(())
    }

    /// Trim leading and trailing spaces off every header value.
    ///
    /// Interior runs are preserved, per the canonical-request rules.
    pub fn normalize_header_values(&mut self) {
        for (_, value) in self.headers.iter_mut() {
            let bytes = value.as_bytes();
            let start = bytes.iter().take_while(|b| **b == b' ').count();
            let end = bytes.len() - bytes.iter().rev().take_while(|b| **b == b' ').count();
            if start == 0 && end == bytes.len() {
                continue;
            }
            *value = HeaderValue::from_bytes(&bytes[start..end.max(start)])
                .expect("trimming spaces keeps a header value valid");
        }
    }

    /// The signed-header list: header names in ascending order.
    ///
    /// `http::HeaderMap` keys are already lowercase, so the result is the
    /// canonical form directly.
    pub fn sorted_header_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.headers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts_for(uri: &str) -> Parts {
        http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_build_and_apply_roundtrip() {
        let mut parts = parts_for("https://s3.us-east-1.amazonaws.com/bucket/key?list-type=2");

        let snapshot = SigningRequest::build(&parts).unwrap();
        assert_eq!(snapshot.path, "/bucket/key");
        assert_eq!(
            snapshot.query,
            vec![("list-type".to_string(), "2".to_string())]
        );

        snapshot.apply(&mut parts).unwrap();
        assert_eq!(
            parts.uri.to_string(),
            "https://s3.us-east-1.amazonaws.com/bucket/key?list-type=2"
        );
    }

    #[test]
    fn test_empty_path_becomes_slash() {
        let snapshot = SigningRequest::build(&parts_for("http://example.amazonaws.com")).unwrap();
        assert_eq!(snapshot.path, "/");
    }

    #[test]
    fn test_build_requires_authority() {
        assert!(SigningRequest::build(&parts_for("/relative/only")).is_err());
    }

    #[test]
    fn test_normalize_header_values() {
        let mut parts = parts_for("http://example.amazonaws.com/");
        parts
            .headers
            .insert("x-test", HeaderValue::from_static("  a  b  "));
        parts
            .headers
            .insert("x-clean", HeaderValue::from_static("c"));

        let mut snapshot = SigningRequest::build(&parts).unwrap();
        snapshot.normalize_header_values();
        assert_eq!(snapshot.headers["x-test"], "a  b");
        assert_eq!(snapshot.headers["x-clean"], "c");
    }

    #[test]
    fn test_sorted_header_names() {
        let mut parts = parts_for("http://example.amazonaws.com/");
        parts
            .headers
            .insert("x-amz-date", HeaderValue::from_static("now"));
        parts.headers.insert("host", HeaderValue::from_static("h"));
        parts
            .headers
            .insert("Content-Type", HeaderValue::from_static("text/plain"));

        let snapshot = SigningRequest::build(&parts).unwrap();
        assert_eq!(
            snapshot.sorted_header_names(),
            vec!["content-type", "host", "x-amz-date"]
        );
    }
}
