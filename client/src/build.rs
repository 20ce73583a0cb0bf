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

use crate::shape::FormValue;
use crate::{Error, OperationDescriptor, Protocol, RequestShape, ServiceConfig};
use awsreq_core::Body;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Request, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Percent-encode set for path segments: unreserved characters stay, the
/// rest is encoded, slashes included.
static PATH_SEGMENT_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// As above, but slashes pass through for `{name+}` placeholders.
static GREEDY_PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode set for query and form values.
static FORM_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Turn an operation plus its typed input into a wire request.
///
/// Fields tagged for header, query, and path locations are pulled from the
/// input; the rest of the shape becomes the body under the service's
/// dialect. The `Host` header is left for the signer, which derives it from
/// the authority.
pub fn build_request<I: RequestShape>(
    op: &OperationDescriptor,
    config: &ServiceConfig,
    input: Option<&I>,
) -> Result<Request<Body>, Error> {
    let endpoint = config.endpoint_url();

    let path = match input {
        Some(input) => substitute_path(op.path, &input.path_params())?,
        None => substitute_path(op.path, &[])?,
    };

    let query = input
        .map(|i| {
            i.query_params()
                .into_iter()
                .map(|(k, v)| {
                    format!("{k}={}", utf8_percent_encode(&v, &FORM_ENCODE_SET))
                })
                .collect::<Vec<_>>()
                .join("&")
        })
        .unwrap_or_default();

    let uri: Uri = if query.is_empty() {
        format!("{endpoint}{path}")
    } else {
        format!("{endpoint}{path}?{query}")
    }
    .parse()
    .map_err(|e: http::uri::InvalidUri| {
        Error::config(format!("invalid request url: {e}"))
    })?;

    let mut builder = Request::builder().method(op.method.clone()).uri(uri);

    if let Some(input) = input {
        for (name, value) in input.header_params() {
            let name: HeaderName = name
                .parse()
                .map_err(|_| Error::config(format!("invalid header name: {name}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| Error::config(format!("invalid value for header {name}")))?;
            builder = builder.header(name, value);
        }
    }

    let (body, content_type) = encode_body(op, config, input)?;

    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    if let (Protocol::Json(_), Some(prefix)) = (config.protocol(), config.amz_target_prefix()) {
        builder = builder.header("X-Amz-Target", format!("{prefix}.{}", op.name));
    }

    builder
        .body(body)
        .map_err(|e| Error::config(format!("failed to build request: {e}")))
}

fn encode_body<I: RequestShape>(
    op: &OperationDescriptor,
    config: &ServiceConfig,
    input: Option<&I>,
) -> Result<(Body, Option<String>), Error> {
    // A designated payload member wins over whole-shape encoding.
    if let Some(input) = input {
        if let Some(payload) = input.payload()? {
            let content_type = match &payload {
                Body::Text(_) => Some("text/plain".to_string()),
                Body::Bytes(_) => Some("application/octet-stream".to_string()),
                Body::Json(_) => Some("application/json".to_string()),
                Body::Xml(_) => Some("application/xml".to_string()),
                Body::Empty => None,
            };
            return Ok((payload, content_type));
        }
    }

    match config.protocol() {
        Protocol::Json(version) => {
            // JSON RPC posts a document even for member-less inputs.
            let value = match input {
                Some(input) => input.json_body()?,
                None => serde_json::json!({}),
            };
            Ok((
                Body::Json(value),
                Some(format!("application/x-amz-json-{version}")),
            ))
        }
        Protocol::RestJson => match input {
            Some(input) => {
                let value = input.json_body()?;
                if value.as_object().is_some_and(|o| o.is_empty()) || value.is_null() {
                    Ok((Body::Empty, None))
                } else {
                    Ok((
                        Body::Json(value),
                        Some("application/x-amz-json-1.1".to_string()),
                    ))
                }
            }
            None => Ok((Body::Empty, None)),
        },
        Protocol::RestXml => match input {
            Some(input) => {
                let xml = input.xml_body()?;
                // Inputs whose members all bind to the URI or headers
                // serialize to a bare root element; those operations carry
                // no body at all.
                if xml.ends_with("/>") && xml.matches('<').count() == 1 {
                    return Ok((Body::Empty, None));
                }
                let xml = match config.xml_namespace() {
                    Some(ns) => inject_namespace(xml, ns),
                    None => xml,
                };
                Ok((Body::Xml(xml), Some("application/xml".to_string())))
            }
            None => Ok((Body::Empty, None)),
        },
        Protocol::Query | Protocol::Ec2 => {
            let form = encode_form(op, config, input)?;
            Ok((
                Body::Text(form),
                Some("application/x-www-form-urlencoded; charset=utf-8".to_string()),
            ))
        }
    }
}

fn encode_form<I: RequestShape>(
    op: &OperationDescriptor,
    config: &ServiceConfig,
    input: Option<&I>,
) -> Result<String, Error> {
    let mut pairs: Vec<(String, String)> = vec![
        ("Action".to_string(), op.name.to_string()),
        ("Version".to_string(), config.api_version().to_string()),
    ];

    if let Some(input) = input {
        for member in input.form_members() {
            match member {
                FormValue::Scalar(name, value) => pairs.push((name.to_string(), value)),
                FormValue::List(name, values) => {
                    for (i, value) in values.into_iter().enumerate() {
                        // The query protocol numbers list entries under a
                        // `member` infix; the EC2 form drops it.
                        let key = match config.protocol() {
                            Protocol::Ec2 => format!("{name}.{}", i + 1),
                            _ => format!("{name}.member.{}", i + 1),
                        };
                        pairs.push((key, value));
                    }
                }
            }
        }
    }

    pairs.sort();

    Ok(pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                utf8_percent_encode(k, &FORM_ENCODE_SET),
                utf8_percent_encode(v, &FORM_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&"))
}

fn substitute_path(template: &str, params: &[(&'static str, String)]) -> Result<String, Error> {
    let mut path = template.to_string();

    for (name, value) in params {
        let greedy = format!("{{{name}+}}");
        let plain = format!("{{{name}}}");
        if path.contains(&greedy) {
            // The `+` form is used where slashes must survive unescaped.
            let encoded = utf8_percent_encode(value, &GREEDY_PATH_ENCODE_SET).to_string();
            path = path.replace(&greedy, &encoded);
        } else if path.contains(&plain) {
            let encoded = utf8_percent_encode(value, &PATH_SEGMENT_ENCODE_SET).to_string();
            path = path.replace(&plain, &encoded);
        }
    }

    if path.contains('{') {
        return Err(Error::config(format!(
            "path template has unresolved parameters: {path}"
        )));
    }
    if path.is_empty() {
        path.push('/');
    }

    Ok(path)
}

fn inject_namespace(xml: String, namespace: &str) -> String {
    // Stamp xmlns onto the root element's open tag.
    match xml.find(['>', ' ']) {
        Some(pos) => {
            let insert_at = if xml[..pos].ends_with('/') { pos - 1 } else { pos };
            format!(
                "{} xmlns=\"{}\"{}",
                &xml[..insert_at],
                namespace,
                &xml[insert_at..]
            )
        }
        None => xml,
    }
}
