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
use awsreq_core::Body;
use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A form member of a query/ec2 dialect request.
///
/// Lists are kept structured so the builder can apply the dialect's
/// flattening rule: the query protocol numbers entries as
/// `Name.member.N`, the EC2 variant as `Name.N`.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// A single `name=value` pair.
    Scalar(&'static str, String),
    /// A list member with its element values in order.
    List(&'static str, Vec<String>),
}

/// How a typed input maps onto the wire.
///
/// Generated bindings implement the accessor methods for every member the
/// model binds to a non-body location; everything left over is the body,
/// encoded through the serde implementations. Members bound to headers,
/// query, or path should carry `#[serde(skip_serializing)]` so they stay out
/// of the body document.
pub trait RequestShape: Serialize + Send + Sync {
    /// `(wire_name, value)` pairs substituted into the path template.
    fn path_params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// `(wire_name, value)` pairs appended to the query string.
    fn query_params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// `(wire_name, value)` pairs copied into request headers.
    fn header_params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// The designated payload member, when the operation has one.
    ///
    /// A `Some` return short-circuits whole-shape body encoding.
    fn payload(&self) -> Result<Option<Body>, Error> {
        Ok(None)
    }

    /// Form members for the query/ec2 dialects.
    fn form_members(&self) -> Vec<FormValue> {
        Vec::new()
    }

    /// JSON-encode the whole shape for the json/rest_json dialects.
    fn json_body(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(self)
            .map_err(|e| Error::protocol_with("failed to encode input shape as JSON", e))
    }

    /// XML-encode the whole shape for the rest_xml dialect.
    ///
    /// The default uses the serde implementation with the type's name as the
    /// root element.
    fn xml_body(&self) -> Result<String, Error> {
        quick_xml::se::to_string(self)
            .map_err(|e| Error::protocol_with("failed to encode input shape as XML", e))
    }
}

/// How a typed output is reconstructed from the wire.
///
/// The defaults decode through serde; generated bindings override
/// [`ResponseShape::apply_headers`] and [`ResponseShape::set_status_code`]
/// for members bound to headers or the synthetic status code, and
/// [`ResponseShape::from_raw_payload`] for raw-payload outputs.
pub trait ResponseShape: Sized + Send + DeserializeOwned {
    /// Attach the raw response body to the shape's payload member.
    fn from_raw_payload(_body: Bytes) -> Result<Self, Error> {
        Err(Error::protocol(
            "output shape has no raw payload member",
        ))
    }

    /// Construct the shape from a decoded JSON document.
    fn from_json(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value)
            .map_err(|e| Error::protocol_with("failed to decode JSON response body", e))
    }

    /// Construct the shape from an XML document.
    fn from_xml(text: &str) -> Result<Self, Error> {
        quick_xml::de::from_str(text)
            .map_err(|e| Error::protocol_with("failed to decode XML response body", e))
    }

    /// Merge response headers into header-located members.
    ///
    /// Header names match case-insensitively; the default shape has none.
    fn apply_headers(&mut self, _headers: &HeaderMap) -> Result<(), Error> {
        Ok(())
    }

    /// Record the HTTP status when the shape declares a member for it.
    fn set_status_code(&mut self, _status: u16) {}
}
