use crate::data_types::StatusCode;

pub const OK: StatusCode = 200;
pub const NO_CONTENT: StatusCode = 204;
pub const BAD_REQUEST: StatusCode = 400;
pub const NOT_FOUND: StatusCode = 404;
pub const REQUEST_TIMEOUT: StatusCode = 408;
pub const PAYLOAD_TOO_LARGE: StatusCode = 413;
pub const INTERNAL_SERVER_ERROR: StatusCode = 500;
pub const NOT_IMPLEMENTED: StatusCode = 501;
pub const SERVICE_UNAVAILABLE: StatusCode = 503;

pub fn reason_phrase(status: StatusCode) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn known_codes_have_phrases() {
        assert_eq!(reason_phrase(OK), "OK");
        assert_eq!(reason_phrase(BAD_REQUEST), "Bad Request");
        assert_eq!(reason_phrase(INTERNAL_SERVER_ERROR), "Internal Server Error");
    }

    #[test]
    pub fn unknown_codes_do_not_panic() {
        assert_eq!(reason_phrase(299), "Unknown");
    }
}
