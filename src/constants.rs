//! Centralized string constants for aperture-client.
//!
//! Reduces string duplication and keeps header/content-type names in one
//! place across logging, error, and template modules.

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

// Environment Variables (reserved for Target / base-URL resolution, §4.8)
pub const ENV_APERTURE_BASE_URL: &str = "APERTURE_BASE_URL";
pub const ENV_APERTURE_ENV: &str = "APERTURE_ENV";
pub const ENV_LOG_MAX_BODY: &str = "APERTURE_LOG_MAX_BODY";

// HTTP Methods
pub const HTTP_METHOD_GET: &str = "GET";
pub const HTTP_METHOD_POST: &str = "POST";
pub const HTTP_METHOD_PUT: &str = "PUT";
pub const HTTP_METHOD_DELETE: &str = "DELETE";
pub const HTTP_METHOD_PATCH: &str = "PATCH";
pub const HTTP_METHOD_HEAD: &str = "HEAD";
pub const HTTP_METHOD_OPTIONS: &str = "OPTIONS";

/// Recognized HTTP request-line verbs (§4.4 contract parser supplement).
#[must_use]
pub fn is_known_http_method(method: &str) -> bool {
    matches!(
        method,
        HTTP_METHOD_GET
            | HTTP_METHOD_POST
            | HTTP_METHOD_PUT
            | HTTP_METHOD_DELETE
            | HTTP_METHOD_PATCH
            | HTTP_METHOD_HEAD
            | HTTP_METHOD_OPTIONS
    )
}
