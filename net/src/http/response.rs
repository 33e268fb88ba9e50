use std::io::Write;

use chrono::Utc;

use super::status::{self, reason_phrase};
use crate::data_types::StatusCode;

/// Status, headers and body produced by a handler. Owned by the worker until
/// fully written to the connection.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(status::OK)
    }

    /// A plain-text response with the content type header already set
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body.into().into_bytes())
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serializes the whole response into a single buffer so it can be
    /// written to the stream in one call. Content-Length, Date, Server and
    /// Connection headers are emitted by the runtime, everything else comes
    /// from the handler verbatim.
    pub fn to_bytes(self: &Self, server: &str, keep_alive: bool) -> Vec<u8> {
        self.serialize(server, keep_alive, true)
    }

    /// Headers only, with the Content-Length the body would have had.
    /// Responses to HEAD requests are framed this way.
    pub fn to_head_bytes(self: &Self, server: &str, keep_alive: bool) -> Vec<u8> {
        self.serialize(server, keep_alive, false)
    }

    fn serialize(self: &Self, server: &str, keep_alive: bool, include_body: bool) -> Vec<u8> {
        let mut buffer: Vec<u8> = Vec::with_capacity(256 + self.body.len());

        // write! to a Vec<u8> cannot fail
        let _ = write!(
            buffer,
            "HTTP/1.1 {} {}\r\n",
            self.status,
            reason_phrase(self.status)
        );
        let _ = write!(
            buffer,
            "Date: {}\r\n",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
        );
        let _ = write!(buffer, "Server: {server}\r\n");
        for (name, value) in &self.headers {
            let _ = write!(buffer, "{name}: {value}\r\n");
        }
        let _ = write!(buffer, "Content-Length: {}\r\n", self.body.len());
        let _ = write!(
            buffer,
            "Connection: {}\r\n\r\n",
            if keep_alive { "keep-alive" } else { "close" }
        );
        if include_body {
            buffer.extend_from_slice(&self.body);
        }

        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(response: &Response, keep_alive: bool) -> String {
        String::from_utf8(response.to_bytes("gantry/test", keep_alive)).unwrap()
    }

    #[test]
    fn serializes_status_line_and_framing_headers() {
        let response = Response::text(status::OK, "hello");
        let text = as_text(&response, true);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Server: gantry/test\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn close_is_signalled_when_not_keeping_alive() {
        let response = Response::new(status::NO_CONTENT);
        let text = as_text(&response, false);

        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.contains("Connection: close\r\n"));
    }

    #[test]
    fn head_framing_keeps_the_length_but_drops_the_body() {
        let response = Response::text(status::OK, "hello");
        let text = String::from_utf8(response.to_head_bytes("gantry/test", true)).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn custom_headers_are_written_verbatim() {
        let response = Response::ok().header("X-Trace-Id", "abc");
        let text = as_text(&response, true);

        assert!(text.contains("X-Trace-Id: abc\r\n"));
    }
}
