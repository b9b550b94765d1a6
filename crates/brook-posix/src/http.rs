//! HTTP/1.1 wire format (minimal, built on std::net)
//!
//! One request per connection: the request is parsed up front, the response is
//! written once with `Connection: close`.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};

/// Longest request line or header line accepted, terminator included.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// Most header lines accepted in one request.
pub const MAX_HEADERS: usize = 100;

/// Largest `Content-Length` accepted.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Source of the `InvalidData` error returned for a body over
/// [`MAX_BODY_BYTES`].
#[derive(Debug)]
pub struct PayloadTooLarge(pub usize);

impl fmt::Display for PayloadTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request body of {} bytes exceeds {} bytes", self.0, MAX_BODY_BYTES)
    }
}

impl std::error::Error for PayloadTooLarge {}

/// Parsed HTTP request data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, as sent (`GET`, `POST`, ...)
    pub method: String,
    /// Path component of the request target, without the query
    pub path: String,
    /// Query string without the leading `?`
    pub query: String,
    /// Headers keyed by lower-cased name
    pub headers: HashMap<String, String>,
    /// Raw body (`Content-Length` bytes)
    pub body: Vec<u8>,
}

/// An accepted request together with the socket its response goes to.
pub struct PendingRequest {
    /// The parsed request
    pub request: HttpRequest,
    stream: TcpStream,
}

impl PendingRequest {
    /// Read and parse one request from a freshly accepted connection.
    ///
    /// A malformed or oversized request is answered here with the status from
    /// [`rejection_status`] before the error is returned.
    pub fn read_from(stream: TcpStream) -> io::Result<Self> {
        let reader = BufReader::new(stream.try_clone()?);
        match parse_request(reader) {
            Ok(request) => Ok(Self { request, stream }),
            Err(err) => {
                if let Some(status) = rejection_status(&err) {
                    let mut stream = stream;
                    let _ = write_response(&mut stream, status, status_text(status).as_bytes());
                }
                Err(err)
            }
        }
    }

    /// Write the response and close the exchange.
    pub fn respond(mut self, status: u16, body: &[u8]) -> io::Result<()> {
        write_response(&mut self.stream, status, body)
    }
}

/// Bind a listening socket on `host:port`.
pub fn bind(host: &str, port: u16) -> io::Result<TcpListener> {
    TcpListener::bind((host, port))
}

/// Status to answer a request that failed to parse with: 413 for an
/// oversized body, 400 for anything else malformed, `None` for I/O errors.
pub fn rejection_status(err: &io::Error) -> Option<u16> {
    if err.kind() != io::ErrorKind::InvalidData {
        return None;
    }
    match err.get_ref() {
        Some(inner) if inner.is::<PayloadTooLarge>() => Some(413),
        _ => Some(400),
    }
}

/// Read one line of at most [`MAX_LINE_BYTES`].
fn read_line_limited<R: BufRead>(reader: &mut R, line: &mut String) -> io::Result<usize> {
    let read = reader.by_ref().take(MAX_LINE_BYTES as u64).read_line(line)?;
    if read == MAX_LINE_BYTES && !line.ends_with('\n') {
        return Err(invalid("HTTP header line too long"));
    }
    Ok(read)
}

/// Parse a request line, headers and `Content-Length` body.
///
/// Lines over [`MAX_LINE_BYTES`], more than [`MAX_HEADERS`] headers and
/// bodies over [`MAX_BODY_BYTES`] are rejected with `InvalidData` before
/// anything is buffered for them.
pub fn parse_request<R: BufRead>(mut reader: R) -> io::Result<HttpRequest> {
    // Read request line: METHOD /path?query HTTP/1.1
    let mut request_line = String::new();
    read_line_limited(&mut reader, &mut request_line)?;
    let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
    if parts.len() < 2 || parts[0].is_empty() {
        return Err(invalid("Invalid HTTP request line"));
    }
    let method = parts[0].to_string();
    let target = parts[1];

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    };

    let mut headers = HashMap::new();
    let mut content_length: usize = 0;
    let mut header_lines = 0;
    loop {
        let mut line = String::new();
        if read_line_limited(&mut reader, &mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADERS {
            return Err(invalid("Too many HTTP headers"));
        }
        if let Some((key, val)) = trimmed.split_once(':') {
            let key = key.trim().to_lowercase();
            let val = val.trim().to_string();
            if key == "content-length" {
                content_length = val
                    .parse()
                    .map_err(|_| invalid("Invalid Content-Length header"))?;
            }
            headers.insert(key, val);
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            PayloadTooLarge(content_length),
        ));
    }
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }

    Ok(HttpRequest {
        method,
        path,
        query,
        headers,
        body,
    })
}

/// Write a complete `text/plain` response.
pub fn write_response<W: Write>(out: &mut W, status: u16, body: &[u8]) -> io::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n\
         Content-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\n",
        status,
        status_text(status),
        body.len()
    );
    out.write_all(header.as_bytes())?;
    out.write_all(body)?;
    out.flush()
}

/// Reason phrase for a status code.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
