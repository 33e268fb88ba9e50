use std::fmt;

use gantry_net::http::{status, Request, Response};

/// The externally registered callable that maps a Request to a Response.
/// The runtime treats it as opaque: it bounds how many invocations run in
/// parallel and contains its failures, nothing more. Handlers that share
/// state across invocations must provide their own synchronization.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Result<Response, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Result<Response, HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        self(request)
    }
}

/// A failure signalled by the handler. The message is logged; the client
/// only ever sees a generic 500.
#[derive(Debug)]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The handler registered by the gantry binary. Echoes the request line and
/// body size back to the caller.
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&self, request: &Request) -> Result<Response, HandlerError> {
        let mut summary = format!("{} {}\n", request.method, request.path);
        if !request.body.is_empty() {
            summary.push_str(&format!("{} body bytes\n", request.body.len()));
        }
        Ok(Response::text(status::OK, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_net::http::{HttpVersion, Method};

    fn request(method: Method, path: &str, body: &[u8]) -> Request {
        Request {
            method,
            path: path.to_string(),
            version: HttpVersion { major: 1, minor: 1 },
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn echo_handler_reports_the_request_line() {
        let response = EchoHandler
            .handle(&request(Method::Get, "/health", b""))
            .unwrap();
        assert_eq!(response.status, status::OK);
        assert_eq!(response.body, b"GET /health\n");
    }

    #[test]
    fn echo_handler_reports_body_size() {
        let response = EchoHandler
            .handle(&request(Method::Post, "/data", b"abcde"))
            .unwrap();
        assert!(String::from_utf8(response.body)
            .unwrap()
            .contains("5 body bytes"));
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |request: &Request| -> Result<Response, HandlerError> {
            Ok(Response::text(status::OK, request.path.clone()))
        };
        let response = handler.handle(&request(Method::Get, "/from-closure", b"")).unwrap();
        assert_eq!(response.body, b"/from-closure");
    }
}
