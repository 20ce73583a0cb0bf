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

use crate::{
    Error, OperationDescriptor, Protocol, ResponseShape, ServiceConfig, ServiceError,
    ServiceErrorKind,
};
use bytes::Bytes;
use serde::Deserialize;

/// Decode a 2xx response into the operation's output shape.
///
/// Raw-payload outputs take the body bytes untouched; everything else is
/// decoded by dialect, then response headers are merged into header-located
/// members and the synthetic status code member is set.
pub fn decode_response<O: ResponseShape>(
    op: &OperationDescriptor,
    config: &ServiceConfig,
    resp: http::Response<Bytes>,
) -> Result<O, Error> {
    let (parts, body) = resp.into_parts();

    let mut output = if op.raw_payload {
        O::from_raw_payload(body)?
    } else {
        match config.protocol() {
            Protocol::Json(_) | Protocol::RestJson => {
                let value = if body.is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_slice(&body).map_err(|e| {
                        Error::protocol_with("response body is not valid JSON", e)
                    })?
                };
                O::from_json(value)?
            }
            // The query dialects answer in XML as well.
            Protocol::RestXml | Protocol::Query | Protocol::Ec2 => {
                if body.is_empty() {
                    O::from_xml("<Empty/>")?
                } else {
                    O::from_xml(&String::from_utf8_lossy(&body))?
                }
            }
        }
    };

    output.apply_headers(&parts.headers)?;
    output.set_status_code(parts.status.as_u16());

    Ok(output)
}

/// Decode a non-2xx response into the error taxonomy.
///
/// Extraction is dialect specific; the decoded code is normalized (namespace
/// prefix and `Exception` suffix stripped) and then classified against the
/// service's own codes, the common 4xx codes, and the common 5xx codes, in
/// that order.
pub fn decode_error(config: &ServiceConfig, resp: http::Response<Bytes>) -> Error {
    let (parts, body) = resp.into_parts();
    let status = parts.status.as_u16();

    let (code, message) = match config.protocol() {
        Protocol::Query | Protocol::Ec2 => extract_query_error(&body),
        Protocol::RestXml => extract_rest_xml_error(&body),
        Protocol::RestJson => extract_rest_json_error(&parts.headers, &body),
        Protocol::Json(_) => extract_json_error(&body),
    };

    let Some(code) = code else {
        return Error::Service(ServiceError {
            status,
            code: String::new(),
            message: "Unhandled Error".to_string(),
            kind: ServiceErrorKind::Unhandled,
            raw_body: Some(body),
        });
    };

    let code = normalize_code(&code);
    let message = message.unwrap_or_default();

    let kind = if config.possible_error_codes().iter().any(|c| c == &code) {
        ServiceErrorKind::Service
    } else if code.parse::<crate::ClientErrorCode>().is_ok() {
        ServiceErrorKind::Client
    } else if code.parse::<crate::ServerErrorCode>().is_ok() {
        ServiceErrorKind::Server
    } else {
        ServiceErrorKind::Generic
    };

    Error::Service(ServiceError {
        status,
        code,
        message,
        kind,
        raw_body: None,
    })
}

/// Strip the namespace prefix and the `Exception` suffix off a raw code.
fn normalize_code(code: &str) -> String {
    let code = match code.rfind('#') {
        Some(pos) => &code[pos + 1..],
        None => code,
    };
    code.strip_suffix("Exception").unwrap_or(code).to_string()
}

#[derive(Debug, Default, Deserialize)]
struct XmlErrorDetail {
    #[serde(rename = "Code", default)]
    code: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlErrorResponse {
    #[serde(rename = "Error")]
    error: XmlErrorDetail,
}

/// `/ErrorResponse/Error/{Code,Message}`
fn extract_query_error(body: &[u8]) -> (Option<String>, Option<String>) {
    let text = String::from_utf8_lossy(body);
    match quick_xml::de::from_str::<XmlErrorResponse>(&text) {
        Ok(resp) => (resp.error.code, resp.error.message),
        Err(_) => (None, None),
    }
}

/// `/Error/{Code,Message}`
fn extract_rest_xml_error(body: &[u8]) -> (Option<String>, Option<String>) {
    let text = String::from_utf8_lossy(body);
    match quick_xml::de::from_str::<XmlErrorDetail>(&text) {
        Ok(detail) if detail.code.is_some() => (detail.code, detail.message),
        // Some rest_xml services wrap the detail like the query dialect does.
        _ => extract_query_error(body),
    }
}

/// Code from the `x-amzn-ErrorType` header (else the body `__type`),
/// message from a body field case-insensitively named `message`.
fn extract_rest_json_error(
    headers: &http::HeaderMap,
    body: &[u8],
) -> (Option<String>, Option<String>) {
    let header_code = headers
        .get("x-amzn-ErrorType")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(':').next().unwrap_or(v).to_string());

    let value: Option<serde_json::Value> = serde_json::from_slice(body).ok();

    let code = header_code.or_else(|| body_type_field(value.as_ref()));
    (code, body_message_field(value.as_ref()))
}

/// Code from the body `__type`, message as for rest_json.
fn extract_json_error(body: &[u8]) -> (Option<String>, Option<String>) {
    let value: Option<serde_json::Value> = serde_json::from_slice(body).ok();
    (
        body_type_field(value.as_ref()),
        body_message_field(value.as_ref()),
    )
}

fn body_type_field(value: Option<&serde_json::Value>) -> Option<String> {
    value?
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn body_message_field(value: Option<&serde_json::Value>) -> Option<String> {
    value?
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("message"))
        .and_then(|(_, v)| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn config(protocol: Protocol) -> ServiceConfig {
        ServiceConfig::builder("test", "us-east-1", protocol, "2011-01-01")
            .build()
            .unwrap()
    }

    fn response(status: u16, body: &str) -> http::Response<Bytes> {
        http::Response::builder()
            .status(status)
            .body(Bytes::from(body.to_string()))
            .unwrap()
    }

    fn service_error(err: Error) -> ServiceError {
        match err {
            Error::Service(err) => err,
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn test_rest_json_throttling_from_body_type() {
        let err = service_error(decode_error(
            &config(Protocol::RestJson),
            response(
                429,
                r#"{"__type":"ThrottlingException","message":"slow down"}"#,
            ),
        ));

        assert_eq!(err.status, 429);
        assert_eq!(err.code, "Throttling");
        assert_eq!(err.message, "slow down");
        assert_eq!(err.kind, ServiceErrorKind::Client);
    }

    #[test]
    fn test_rest_json_error_type_header_wins() {
        let resp = http::Response::builder()
            .status(400)
            .header(
                "x-amzn-ErrorType",
                "ValidationErrorException:http://internal.amazon.com/coral/",
            )
            .body(Bytes::from_static(b"{\"Message\":\"bad field\"}"))
            .unwrap();

        let err = service_error(decode_error(&config(Protocol::RestJson), resp));
        assert_eq!(err.code, "ValidationError");
        assert_eq!(err.message, "bad field");
        assert_eq!(err.kind, ServiceErrorKind::Client);
    }

    #[test]
    fn test_json_namespace_prefix_stripped() {
        let err = service_error(decode_error(
            &config(Protocol::Json("1.0")),
            response(
                400,
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"no such table"}"#,
            ),
        ));

        assert_eq!(err.code, "ResourceNotFound");
        assert_eq!(err.message, "no such table");
        assert_eq!(err.kind, ServiceErrorKind::Generic);
    }

    #[test]
    fn test_query_error_response() {
        let body = "<ErrorResponse><Error><Type>Sender</Type>\
                    <Code>Throttling</Code><Message>Rate exceeded</Message>\
                    </Error><RequestId>abc</RequestId></ErrorResponse>";
        let err = service_error(decode_error(&config(Protocol::Query), response(400, body)));

        assert_eq!(err.code, "Throttling");
        assert_eq!(err.message, "Rate exceeded");
        assert_eq!(err.kind, ServiceErrorKind::Client);
    }

    #[test]
    fn test_rest_xml_error() {
        let body = "<Error><Code>NoSuchBucket</Code>\
                    <Message>The specified bucket does not exist</Message></Error>";
        let err = service_error(decode_error(
            &config(Protocol::RestXml),
            response(404, body),
        ));

        assert_eq!(err.code, "NoSuchBucket");
        assert_eq!(err.kind, ServiceErrorKind::Generic);
    }

    #[test]
    fn test_service_specific_code() {
        let config = ServiceConfig::builder("test", "us-east-1", Protocol::RestJson, "2011-01-01")
            .with_possible_error_codes(["ResourceNotFound"])
            .build()
            .unwrap();

        let err = service_error(decode_error(
            &config,
            response(404, r#"{"__type":"ResourceNotFoundException"}"#),
        ));
        assert_eq!(err.code, "ResourceNotFound");
        assert_eq!(err.kind, ServiceErrorKind::Service);
    }

    #[test]
    fn test_server_error_code() {
        let err = service_error(decode_error(
            &config(Protocol::Json("1.1")),
            response(503, r#"{"__type":"ServiceUnavailable"}"#),
        ));
        assert_eq!(err.kind, ServiceErrorKind::Server);
    }

    #[test]
    fn test_undecodable_error_keeps_raw_body() {
        let err = service_error(decode_error(
            &config(Protocol::Json("1.1")),
            response(500, "<html>gateway exploded</html>"),
        ));

        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Unhandled Error");
        assert_eq!(err.kind, ServiceErrorKind::Unhandled);
        assert_eq!(
            err.raw_body,
            Some(Bytes::from_static(b"<html>gateway exploded</html>"))
        );
    }

    #[derive(Debug, Deserialize)]
    struct JsonOutput {
        #[serde(rename = "Name")]
        name: String,
        #[serde(skip)]
        request_id: Option<String>,
        #[serde(skip)]
        status_code: u16,
    }

    impl ResponseShape for JsonOutput {
        fn apply_headers(&mut self, headers: &HeaderMap) -> Result<(), Error> {
            self.request_id = headers
                .get("x-amz-request-id")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            Ok(())
        }

        fn set_status_code(&mut self, status: u16) {
            self.status_code = status;
        }
    }

    #[test]
    fn test_decode_json_output_with_headers_and_status() {
        let op = OperationDescriptor::new("GetThing", Method::GET, "/");
        let resp = http::Response::builder()
            .status(StatusCode::OK)
            // Header names match case-insensitively.
            .header("X-Amz-Request-Id", "req-123")
            .body(Bytes::from_static(br#"{"Name":"thing-1"}"#))
            .unwrap();

        let out: JsonOutput =
            decode_response(&op, &config(Protocol::RestJson), resp).unwrap();
        assert_eq!(out.name, "thing-1");
        assert_eq!(out.request_id, Some("req-123".to_string()));
        assert_eq!(out.status_code, 200);
    }

    #[derive(Debug, Deserialize)]
    struct XmlOutput {
        #[serde(rename = "Name")]
        name: String,
    }

    impl ResponseShape for XmlOutput {}

    #[test]
    fn test_decode_xml_output() {
        let op = OperationDescriptor::new("GetThing", Method::GET, "/");
        let resp = response(200, "<GetThingResult><Name>thing-1</Name></GetThingResult>");

        let out: XmlOutput = decode_response(&op, &config(Protocol::Query), resp).unwrap();
        assert_eq!(out.name, "thing-1");
    }

    #[derive(Debug, Deserialize)]
    struct RawOutput {
        #[serde(skip)]
        data: Bytes,
    }

    impl ResponseShape for RawOutput {
        fn from_raw_payload(body: Bytes) -> Result<Self, Error> {
            Ok(RawOutput { data: body })
        }
    }

    #[test]
    fn test_raw_payload_attach() {
        let op = OperationDescriptor::new("GetBlob", Method::GET, "/").with_raw_payload();
        let resp = response(200, "\x00binary\x01");

        let out: RawOutput = decode_response(&op, &config(Protocol::RestJson), resp).unwrap();
        assert_eq!(out.data, Bytes::from_static(b"\x00binary\x01"));
    }

    #[test]
    fn test_decode_empty_json_body() {
        #[derive(Debug, Deserialize)]
        struct Empty {}
        impl ResponseShape for Empty {}

        let op = OperationDescriptor::new("DeleteThing", Method::DELETE, "/");
        let resp = response(204, "");
        let out: Result<Empty, _> = decode_response(&op, &config(Protocol::RestJson), resp);
        assert!(out.is_ok());
    }
}
