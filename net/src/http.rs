pub mod request;
pub mod response;
pub mod status;

pub use request::{read_request, HttpVersion, Method, Request, RequestError};
pub use response::Response;

/// Hard limit on the bytes of a single request line or header line
pub const MAX_LINE_LENGTH: usize = 8192;

/// Hard limit on the number of headers in one request
pub const MAX_HEADER_COUNT: usize = 100;

/// Hard limit on the declared Content-Length of a request body
pub const MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;
