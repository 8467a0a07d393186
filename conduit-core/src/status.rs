// Status codes carried by messages
//
// Besides the standard HTTP codes, the pipeline defines a handful of
// synthetic codes below 100 that describe failures which happened before
// or after the remote side answered. Their numeric values are part of the
// wire contract and must not change.

use std::fmt;

/// Message status code.
///
/// A thin wrapper over the numeric code so that statuses received from a
/// remote peer survive unchanged even when they are not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(u16);

impl Status {
    // Synthetic pipeline codes
    pub const UNABLE_TO_CONNECT: Status = Status(0);
    pub const NO_ENDPOINT_FOUND: Status = Status(1);
    pub const REQUEST_IS_NULL: Status = Status(10);
    pub const REQUEST_FAILED: Status = Status(11);
    pub const REQUEST_CONNECTION_TIMEOUT: Status = Status(12);
    pub const RESPONSE_IS_NULL: Status = Status(20);
    pub const RESPONSE_FAILED: Status = Status(21);
    pub const RESPONSE_DATA_TRANSFER_TIMEOUT: Status = Status(22);

    // 2xx Success
    pub const OK: Status = Status(200);
    pub const CREATED: Status = Status(201);
    pub const ACCEPTED: Status = Status(202);
    pub const NON_AUTHORITATIVE_INFORMATION: Status = Status(203);
    pub const NO_CONTENT: Status = Status(204);
    pub const RESET_CONTENT: Status = Status(205);
    pub const PARTIAL_CONTENT: Status = Status(206);
    pub const MULTI_STATUS: Status = Status(207);

    // 3xx Redirection
    pub const MULTIPLE_CHOICES: Status = Status(300);
    pub const MOVED_PERMANENTLY: Status = Status(301);
    pub const FOUND: Status = Status(302);
    pub const SEE_OTHER: Status = Status(303);
    pub const NOT_MODIFIED: Status = Status(304);
    pub const USE_PROXY: Status = Status(305);
    pub const TEMPORARY_REDIRECT: Status = Status(307);

    // 4xx Client Errors
    pub const BAD_REQUEST: Status = Status(400);
    pub const UNAUTHORIZED: Status = Status(401);
    pub const PAYMENT_REQUIRED: Status = Status(402);
    pub const FORBIDDEN: Status = Status(403);
    pub const NOT_FOUND: Status = Status(404);
    pub const METHOD_NOT_ALLOWED: Status = Status(405);
    pub const NOT_ACCEPTABLE: Status = Status(406);
    pub const PROXY_AUTHENTICATION_REQUIRED: Status = Status(407);
    pub const REQUEST_TIMEOUT: Status = Status(408);
    pub const CONFLICT: Status = Status(409);
    pub const GONE: Status = Status(410);
    pub const LENGTH_REQUIRED: Status = Status(411);
    pub const PRECONDITION_FAILED: Status = Status(412);
    pub const REQUEST_ENTITY_TOO_LARGE: Status = Status(413);
    pub const REQUEST_URI_TOO_LONG: Status = Status(414);
    pub const UNSUPPORTED_MEDIA_TYPE: Status = Status(415);
    pub const REQUESTED_RANGE_NOT_SATISFIABLE: Status = Status(416);
    pub const EXPECTATION_FAILED: Status = Status(417);
    pub const UNPROCESSABLE_ENTITY: Status = Status(422);
    pub const LOCKED: Status = Status(423);
    pub const FAILED_DEPENDENCY: Status = Status(424);

    // 5xx Server Errors
    pub const INTERNAL_ERROR: Status = Status(500);
    pub const NOT_IMPLEMENTED: Status = Status(501);
    pub const BAD_GATEWAY: Status = Status(502);
    pub const SERVICE_UNAVAILABLE: Status = Status(503);
    pub const GATEWAY_TIMEOUT: Status = Status(504);
    pub const HTTP_VERSION_NOT_SUPPORTED: Status = Status(505);
    pub const INSUFFICIENT_STORAGE: Status = Status(507);

    /// Wrap a raw numeric code.
    pub const fn from_code(code: u16) -> Self {
        Status(code)
    }

    /// Get the numeric status code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get the reason phrase for the status code
    pub fn reason(&self) -> &'static str {
        match self.0 {
            0 => "Unable To Connect",
            1 => "No Endpoint Found",
            10 => "Request Is Null",
            11 => "Request Failed",
            12 => "Request Connection Timeout",
            20 => "Response Is Null",
            21 => "Response Failed",
            22 => "Response Data Transfer Timeout",

            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            207 => "Multi-Status",

            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            307 => "Temporary Redirect",

            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Request Entity Too Large",
            414 => "Request-URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Requested Range Not Satisfiable",
            417 => "Expectation Failed",
            422 => "Unprocessable Entity",
            423 => "Locked",
            424 => "Failed Dependency",

            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            507 => "Insufficient Storage",

            _ => "Unknown",
        }
    }

    /// Check if status is one of the synthetic pipeline codes (below 100)
    pub fn is_synthetic(&self) -> bool {
        self.0 < 100
    }

    /// Check if status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Check if status is redirection (3xx)
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.0)
    }

    /// Check if the pipeline follows this redirect automatically (301, 302, 307)
    pub fn is_followable_redirect(&self) -> bool {
        matches!(self.0, 301 | 302 | 307)
    }

    /// Check if status is client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Check if status is server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// Check if status is an error (synthetic, 4xx or 5xx)
    pub fn is_error(&self) -> bool {
        self.is_synthetic() || self.is_client_error() || self.is_server_error()
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Status(code)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}
