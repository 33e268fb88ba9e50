use std::{
    fmt,
    io::{self, BufRead, Read},
    str::FromStr,
};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use super::{MAX_CONTENT_LENGTH, MAX_HEADER_COUNT, MAX_LINE_LENGTH};
use crate::data_types::ContentLength;

const REQUEST_LINE_REGEX: &str = r"^([A-Za-z]+) (\S+) HTTP/([0-9])\.([0-9])$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    pub fn as_str(self: &Self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// One parsed unit of work. Immutable once constructed, owned by the worker
/// that is servicing the connection it arrived on.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Case-insensitive header lookup, first match wins
    pub fn header(self: &Self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the connection should stay open after the response is written.
    /// HTTP/1.1 defaults to keep-alive unless the client asks to close,
    /// HTTP/1.0 must opt in explicitly.
    pub fn keep_alive(self: &Self) -> bool {
        match self.header("connection") {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version.major == 1 && self.version.minor >= 1,
        }
    }
}

#[derive(Debug)]
pub enum RequestError {
    MalformedRequestLine(String),
    MalformedHeader(String),
    UnsupportedMethod(String),
    InvalidContentLength(String),
    BodyTooLarge(ContentLength),
    TooManyHeaders,
    LineTooLong,
    UnexpectedEndOfStream,
    Io(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MalformedRequestLine(line) => {
                write!(f, "malformed request line: {line:?}")
            }
            RequestError::MalformedHeader(line) => write!(f, "malformed header: {line:?}"),
            RequestError::UnsupportedMethod(method) => {
                write!(f, "unsupported method: {method:?}")
            }
            RequestError::InvalidContentLength(value) => {
                write!(f, "invalid content-length: {value:?}")
            }
            RequestError::BodyTooLarge(length) => {
                write!(f, "declared body of {length} bytes exceeds the limit")
            }
            RequestError::TooManyHeaders => write!(f, "too many headers"),
            RequestError::LineTooLong => write!(f, "request or header line too long"),
            RequestError::UnexpectedEndOfStream => {
                write!(f, "connection closed before the request was complete")
            }
            RequestError::Io(e) => write!(f, "i/o error reading request: {e}"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        RequestError::Io(e)
    }
}

/// Reads exactly one well-formed request from the stream, or fails with the
/// reason it was not well-formed. The caller decides what to do with the
/// connection afterwards.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, RequestError> {
    lazy_static! {
        static ref REGEX: Regex = Regex::new(REQUEST_LINE_REGEX).unwrap();
    }

    let request_line = read_line(reader)?;
    let captures = REGEX
        .captures(&request_line)
        .ok_or_else(|| RequestError::MalformedRequestLine(request_line.clone()))?;

    let method = Method::from_str(&captures[1])
        .map_err(|_| RequestError::UnsupportedMethod(captures[1].to_string()))?;
    let path = captures[2].to_string();
    let version = HttpVersion {
        // Single digits, guaranteed by the regex
        major: captures[3].parse().unwrap_or(1),
        minor: captures[4].parse().unwrap_or(1),
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADER_COUNT {
            return Err(RequestError::TooManyHeaders);
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RequestError::MalformedHeader(line.clone()))?;
        if name.is_empty() || name.contains(' ') {
            return Err(RequestError::MalformedHeader(line.clone()));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    let body = read_body(reader, &headers)?;

    debug!("Request: {method} {path} {version}, {} body bytes", body.len());

    Ok(Request {
        method,
        path,
        version,
        headers,
        body,
    })
}

/// Reads one CRLF (or bare LF) terminated line, without the terminator
fn read_line<R: BufRead>(reader: &mut R) -> Result<String, RequestError> {
    let mut buffer: Vec<u8> = Vec::new();
    let count = reader
        .by_ref()
        .take((MAX_LINE_LENGTH + 1) as u64)
        .read_until(b'\n', &mut buffer)?;
    if count == 0 {
        return Err(RequestError::UnexpectedEndOfStream);
    }
    if buffer.last() != Some(&b'\n') {
        return if count > MAX_LINE_LENGTH {
            Err(RequestError::LineTooLong)
        } else {
            Err(RequestError::UnexpectedEndOfStream)
        };
    }
    buffer.pop();
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
    String::from_utf8(buffer).map_err(|e| {
        RequestError::MalformedHeader(String::from_utf8_lossy(e.as_bytes()).into_owned())
    })
}

fn read_body<R: BufRead>(
    reader: &mut R,
    headers: &[(String, String)],
) -> Result<Vec<u8>, RequestError> {
    let declared = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.as_str());

    // Chunked request bodies are not supported by this runtime
    if headers
        .iter()
        .any(|(name, value)| {
            name.eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
        })
    {
        return Err(RequestError::MalformedHeader("Transfer-Encoding: chunked".to_string()));
    }

    let length: ContentLength = match declared {
        None => return Ok(Vec::new()),
        Some(value) => value
            .parse()
            .map_err(|_| RequestError::InvalidContentLength(value.to_string()))?,
    };
    if length > MAX_CONTENT_LENGTH {
        return Err(RequestError::BodyTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            RequestError::UnexpectedEndOfStream
        } else {
            RequestError::Io(e)
        }
    })?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(raw: &[u8]) -> Result<Request, RequestError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader)
    }

    #[test]
    fn parses_get_without_body() {
        let request = parse(b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/status");
        assert_eq!(request.version, HttpVersion { major: 1, minor: 1 });
        assert_eq!(request.header("host"), Some("localhost"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn parses_post_with_content_length_body() {
        let request =
            parse(b"POST /orders HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, b"hello");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request =
            parse(b"GET / HTTP/1.1\r\nX-Request-Id: abc-123\r\n\r\n").unwrap();
        assert_eq!(request.header("x-request-id"), Some("abc-123"));
        assert_eq!(request.header("X-REQUEST-ID"), Some("abc-123"));
        assert_eq!(request.header("x-other"), None);
    }

    #[test]
    fn rejects_malformed_request_line() {
        let result = parse(b"GET /\r\n\r\n");
        assert!(matches!(result, Err(RequestError::MalformedRequestLine(_))));
    }

    #[test]
    fn rejects_unknown_method() {
        let result = parse(b"BREW /pot HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(RequestError::UnsupportedMethod(_))));
    }

    #[test]
    fn rejects_header_without_colon() {
        let result = parse(b"GET / HTTP/1.1\r\nNot a header\r\n\r\n");
        assert!(matches!(result, Err(RequestError::MalformedHeader(_))));
    }

    #[test]
    fn rejects_truncated_header_block() {
        let result = parse(b"GET / HTTP/1.1\r\nHost: localh");
        assert!(matches!(result, Err(RequestError::UnexpectedEndOfStream)));
    }

    #[test]
    fn rejects_truncated_body() {
        let result = parse(b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\nshort");
        assert!(matches!(result, Err(RequestError::UnexpectedEndOfStream)));
    }

    #[test]
    fn rejects_non_numeric_content_length() {
        let result = parse(b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n");
        assert!(matches!(result, Err(RequestError::InvalidContentLength(_))));
    }

    #[test]
    fn rejects_oversized_content_length() {
        let raw = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_CONTENT_LENGTH + 1
        );
        let result = parse(raw.as_bytes());
        assert!(matches!(result, Err(RequestError::BodyTooLarge(_))));
    }

    #[test]
    fn rejects_chunked_transfer_encoding() {
        let result = parse(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(matches!(result, Err(RequestError::MalformedHeader(_))));
    }

    #[test]
    fn rejects_overlong_request_line() {
        let mut raw = Vec::from(&b"GET /"[..]);
        raw.extend(std::iter::repeat(b'a').take(MAX_LINE_LENGTH));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let result = parse(&raw);
        assert!(matches!(result, Err(RequestError::LineTooLong)));
    }

    #[test]
    fn keep_alive_defaults() {
        let http11 = parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(http11.keep_alive());

        let http11_close = parse(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!http11_close.keep_alive());

        let http10 = parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!http10.keep_alive());

        let http10_keep_alive =
            parse(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").unwrap();
        assert!(http10_keep_alive.keep_alive());
    }

    #[test]
    fn consecutive_requests_parse_from_one_stream() {
        let raw: &[u8] =
            b"GET /first HTTP/1.1\r\n\r\nPOST /second HTTP/1.1\r\nContent-Length: 2\r\n\r\nok";
        let mut reader = BufReader::new(raw);
        let first = read_request(&mut reader).unwrap();
        let second = read_request(&mut reader).unwrap();
        assert_eq!(first.path, "/first");
        assert_eq!(second.path, "/second");
        assert_eq!(second.body, b"ok");
    }
}
