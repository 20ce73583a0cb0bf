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

//! In-process HTTP/1.1 conversation peer for protocol tests.
//!
//! [`FixtureServer`] binds a loopback port, reads exactly one request per
//! exchange, hands it to a callback, and writes the returned response. It
//! understands `Transfer-Encoding: chunked` and the AWS-specific
//! `Content-Encoding: aws-chunked` framing, where each chunk is prefixed
//! `<hex-size>;chunk-signature=<64 hex>\r\n` and a zero-size chunk ends the
//! stream. Chunk signatures are not verified; malformed framing fails the
//! read.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Errors from the fixture server's reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// The chunked or aws-chunked framing is malformed.
    #[error("corrupt chunked data")]
    CorruptChunkedData,
    /// The request head could not be parsed.
    #[error("malformed http request")]
    MalformedRequest,
    /// The handler rejected the request.
    #[error("handler error: {0}")]
    Handler(String),
    /// The socket failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A one-request-at-a-time HTTP/1.1 test peer.
pub struct FixtureServer {
    listener: TcpListener,
}

impl FixtureServer {
    /// Bind a fresh loopback port.
    pub async fn bind() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    /// The server's base URI, e.g. `http://127.0.0.1:54321`.
    pub fn uri(&self) -> String {
        let addr = self.listener.local_addr().expect("listener has an address");
        format!("http://{addr}")
    }

    /// Accept one connection, read one request, answer it.
    ///
    /// Every response carries `Connection: close` so clients open a fresh
    /// connection per exchange.
    pub async fn process<F>(&self, handler: F) -> Result<(), FixtureError>
    where
        F: FnOnce(Request<Bytes>) -> Result<Response<Bytes>, FixtureError>,
    {
        let (mut stream, _) = self.listener.accept().await?;
        let req = read_request(&mut stream).await?;
        let resp = handler(req)?;
        write_response(&mut stream, resp).await?;
        Ok(())
    }

    /// Serve `count` sequential exchanges with the same handler.
    pub async fn process_many<F>(&self, count: usize, mut handler: F) -> Result<(), FixtureError>
    where
        F: FnMut(Request<Bytes>) -> Result<Response<Bytes>, FixtureError>,
    {
        for _ in 0..count {
            let (mut stream, _) = self.listener.accept().await?;
            let req = read_request(&mut stream).await?;
            let resp = handler(req)?;
            write_response(&mut stream, resp).await?;
        }
        Ok(())
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<Request<Bytes>, FixtureError> {
    let mut buf = Vec::with_capacity(1024);

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > 64 * 1024 {
            return Err(FixtureError::MalformedRequest);
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(FixtureError::MalformedRequest);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head =
        std::str::from_utf8(&buf[..header_end - 4]).map_err(|_| FixtureError::MalformedRequest)?;
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(FixtureError::MalformedRequest)?;
    let mut pieces = request_line.split(' ');
    let method: Method = pieces
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or(FixtureError::MalformedRequest)?;
    let target: Uri = pieces
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or(FixtureError::MalformedRequest)?;
    if pieces.next().is_none() {
        return Err(FixtureError::MalformedRequest);
    }

    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(FixtureError::MalformedRequest)?;
        let name: HeaderName = name
            .trim()
            .parse()
            .map_err(|_| FixtureError::MalformedRequest)?;
        let value: HeaderValue = value
            .trim()
            .parse()
            .map_err(|_| FixtureError::MalformedRequest)?;
        headers.append(name, value);
    }

    let leftover = buf[header_end..].to_vec();
    let aws_chunked = header_contains(&headers, http::header::CONTENT_ENCODING, "aws-chunked");

    // aws-chunked rides inside whatever transfer framing the client picked;
    // without one, the aws-chunked framing itself bounds the read.
    let body = if header_contains(&headers, http::header::TRANSFER_ENCODING, "chunked") {
        let body = read_framed(stream, leftover, try_decode_chunked).await?;
        if aws_chunked {
            decode_aws_chunked(&body)?
        } else {
            body
        }
    } else if let Some(len) = content_length(&headers) {
        let body = read_exact_body(stream, leftover, len).await?;
        if aws_chunked {
            decode_aws_chunked(&body)?
        } else {
            body
        }
    } else if aws_chunked {
        read_framed(stream, leftover, try_decode_aws_chunked).await?
    } else {
        leftover
    };

    let mut req = Request::new(Bytes::from(body));
    *req.method_mut() = method;
    *req.uri_mut() = target;
    *req.headers_mut() = headers;
    Ok(req)
}

async fn write_response(
    stream: &mut TcpStream,
    resp: Response<Bytes>,
) -> Result<(), FixtureError> {
    let (parts, body) = resp.into_parts();

    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("Unknown")
    );
    for (name, value) in parts.headers.iter() {
        if name == http::header::CONTENT_LENGTH || name == http::header::CONNECTION {
            continue;
        }
        head.push_str(&format!(
            "{}: {}\r\n",
            name,
            value.to_str().map_err(|_| FixtureError::MalformedRequest)?
        ));
    }
    head.push_str(&format!("content-length: {}\r\n", body.len()));
    head.push_str("connection: close\r\n\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(())
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn header_contains(headers: &HeaderMap, name: HeaderName, needle: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            v.split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(needle))
        })
}

async fn read_exact_body(
    stream: &mut TcpStream,
    mut body: Vec<u8>,
    len: usize,
) -> Result<Vec<u8>, FixtureError> {
    while body.len() < len {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(FixtureError::MalformedRequest);
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(len);
    Ok(body)
}

/// Keep reading until the framing decoder sees a complete stream.
async fn read_framed(
    stream: &mut TcpStream,
    mut buf: Vec<u8>,
    decode: fn(&[u8]) -> Result<Option<Vec<u8>>, FixtureError>,
) -> Result<Vec<u8>, FixtureError> {
    loop {
        if let Some(decoded) = decode(&buf)? {
            return Ok(decoded);
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(FixtureError::CorruptChunkedData);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Standard HTTP/1.1 chunked framing. Chunk extensions are tolerated.
///
/// Returns `Ok(None)` when the buffer is merely incomplete.
fn try_decode_chunked(buf: &[u8]) -> Result<Option<Vec<u8>>, FixtureError> {
    let mut out = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_end) = find_subsequence(&buf[pos..], b"\r\n").map(|p| p + pos) else {
            return Ok(None);
        };
        let line =
            std::str::from_utf8(&buf[pos..line_end]).map_err(|_| FixtureError::CorruptChunkedData)?;
        let size_str = line.split(';').next().unwrap_or(line).trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| FixtureError::CorruptChunkedData)?;
        pos = line_end + 2;

        if size == 0 {
            return Ok(Some(out));
        }
        if pos + size + 2 > buf.len() {
            return Ok(None);
        }
        out.extend_from_slice(&buf[pos..pos + size]);
        if &buf[pos + size..pos + size + 2] != b"\r\n" {
            return Err(FixtureError::CorruptChunkedData);
        }
        pos += size + 2;
    }
}

/// Decode an aws-chunked body into the raw payload bytes.
///
/// Each chunk must be framed exactly as
/// `<hex-size>;chunk-signature=<64 hex>\r\n<bytes>\r\n`; a zero-size chunk
/// terminates the stream. Signature values are not verified.
pub fn decode_aws_chunked(body: &[u8]) -> Result<Vec<u8>, FixtureError> {
    const SIGNATURE_PREFIX: &[u8] = b"chunk-signature=";
    const SIGNATURE_HEX_LEN: usize = 64;

    let mut out = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = find_subsequence(&body[pos..], b"\r\n")
            .map(|p| p + pos)
            .ok_or(FixtureError::CorruptChunkedData)?;
        let line = &body[pos..line_end];

        let sep = line
            .iter()
            .position(|b| *b == b';')
            .ok_or(FixtureError::CorruptChunkedData)?;
        let (size_part, ext) = (&line[..sep], &line[sep + 1..]);

        if ext.len() != SIGNATURE_PREFIX.len() + SIGNATURE_HEX_LEN
            || !ext.starts_with(SIGNATURE_PREFIX)
            || !ext[SIGNATURE_PREFIX.len()..]
                .iter()
                .all(|b| b.is_ascii_hexdigit())
        {
            return Err(FixtureError::CorruptChunkedData);
        }

        let size_str =
            std::str::from_utf8(size_part).map_err(|_| FixtureError::CorruptChunkedData)?;
        let size = usize::from_str_radix(size_str.trim(), 16)
            .map_err(|_| FixtureError::CorruptChunkedData)?;
        pos = line_end + 2;

        if size == 0 {
            return Ok(out);
        }
        if pos + size + 2 > body.len() {
            return Err(FixtureError::CorruptChunkedData);
        }
        out.extend_from_slice(&body[pos..pos + size]);
        if &body[pos + size..pos + size + 2] != b"\r\n" {
            return Err(FixtureError::CorruptChunkedData);
        }
        pos += size + 2;
    }
}

/// Incremental wrapper over [`decode_aws_chunked`] for streamed reads.
fn try_decode_aws_chunked(buf: &[u8]) -> Result<Option<Vec<u8>>, FixtureError> {
    match decode_aws_chunked(buf) {
        Ok(out) => Ok(Some(out)),
        Err(_) if !buf.ends_with(b"\r\n") => Ok(None),
        Err(e) => Err(e),
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt;

    const SIG: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_decode_aws_chunked() {
        let body = format!("5;chunk-signature={SIG}\r\nhello\r\n0;chunk-signature={SIG}\r\n\r\n");
        let decoded = decode_aws_chunked(body.as_bytes()).unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn test_decode_aws_chunked_multiple_chunks() {
        let body = format!(
            "3;chunk-signature={SIG}\r\nfoo\r\n3;chunk-signature={SIG}\r\nbar\r\n0;chunk-signature={SIG}\r\n\r\n"
        );
        let decoded = decode_aws_chunked(body.as_bytes()).unwrap();
        assert_eq!(decoded, b"foobar");
    }

    #[test]
    fn test_decode_aws_chunked_rejects_bad_framing() {
        // Missing the chunk-signature extension entirely.
        let body = "5\r\nhello\r\n0\r\n\r\n";
        assert!(matches!(
            decode_aws_chunked(body.as_bytes()),
            Err(FixtureError::CorruptChunkedData)
        ));

        // Signature of the wrong length.
        let body = "5;chunk-signature=abcd\r\nhello\r\n";
        assert!(matches!(
            decode_aws_chunked(body.as_bytes()),
            Err(FixtureError::CorruptChunkedData)
        ));

        // Truncated chunk data.
        let body = format!("10;chunk-signature={SIG}\r\nshort\r\n");
        assert!(matches!(
            decode_aws_chunked(body.as_bytes()),
            Err(FixtureError::CorruptChunkedData)
        ));
    }

    #[test]
    fn test_try_decode_chunked() {
        assert_eq!(
            try_decode_chunked(b"5\r\nhello\r\n0\r\n\r\n").unwrap(),
            Some(b"hello".to_vec())
        );
        // Incomplete buffers ask for more data.
        assert_eq!(try_decode_chunked(b"5\r\nhel").unwrap(), None);
        // Garbage sizes are corrupt.
        assert!(try_decode_chunked(b"zz\r\nhello\r\n").is_err());
    }

    async fn send_raw(uri: &str, payload: &str) -> String {
        let addr = uri.strip_prefix("http://").unwrap().to_string();
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(payload.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_plain_exchange() {
        let server = FixtureServer::bind().await.unwrap();
        let uri = server.uri();

        let client = tokio::spawn(async move {
            send_raw(
                &uri,
                "POST /things HTTP/1.1\r\nhost: test\r\ncontent-length: 4\r\n\r\nping",
            )
            .await
        });

        server
            .process(|req| {
                assert_eq!(req.method(), Method::POST);
                assert_eq!(req.uri().path(), "/things");
                assert_eq!(req.body().as_ref(), b"ping");
                Ok(Response::builder()
                    .status(200)
                    .body(Bytes::from_static(b"pong"))
                    .unwrap())
            })
            .await
            .unwrap();

        let reply = client.await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.ends_with("pong"));
    }

    #[tokio::test]
    async fn test_chunked_transfer_encoding() {
        let server = FixtureServer::bind().await.unwrap();
        let uri = server.uri();

        let client = tokio::spawn(async move {
            send_raw(
                &uri,
                "PUT /obj HTTP/1.1\r\nhost: test\r\ntransfer-encoding: chunked\r\n\r\n\
                 5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
            )
            .await
        });

        server
            .process(|req| {
                assert_eq!(req.body().as_ref(), b"hello world");
                Ok(Response::new(Bytes::new()))
            })
            .await
            .unwrap();
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_aws_chunked_content_encoding() {
        let server = FixtureServer::bind().await.unwrap();
        let uri = server.uri();

        let encoded =
            format!("5;chunk-signature={SIG}\r\nhello\r\n0;chunk-signature={SIG}\r\n\r\n");
        let payload = format!(
            "PUT /obj HTTP/1.1\r\nhost: test\r\ncontent-encoding: aws-chunked\r\n\
             content-length: {}\r\n\r\n{}",
            encoded.len(),
            encoded
        );

        let client = tokio::spawn(async move { send_raw(&uri, &payload).await });

        server
            .process(|req| {
                assert_eq!(req.body().as_ref(), b"hello");
                Ok(Response::new(Bytes::new()))
            })
            .await
            .unwrap();
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_aws_chunked_fails_read() {
        let server = FixtureServer::bind().await.unwrap();
        let uri = server.uri();

        let encoded = "5;chunk-signature=not-hex\r\nhello\r\n";
        let payload = format!(
            "PUT /obj HTTP/1.1\r\nhost: test\r\ncontent-encoding: aws-chunked\r\n\
             content-length: {}\r\n\r\n{}",
            encoded.len(),
            encoded
        );

        let client = tokio::spawn(async move { send_raw(&uri, &payload).await });

        let result = server.process(|_| Ok(Response::new(Bytes::new()))).await;
        assert!(matches!(result, Err(FixtureError::CorruptChunkedData)));
        drop(client);
    }
}
