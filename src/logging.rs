//! Request and response logging with automatic secret redaction.
//!
//! Gated by `LogLevel` (`config::LogLevel`): `info!` for method/URL and
//! status/duration, `debug!` for headers, `trace!` for bodies. Sensitive
//! header and query-parameter names are always redacted; values matching a
//! registered secret are redacted wherever they appear.

use tracing::{debug, info, trace};

/// Minimum length for a secret to be redacted in body content.
/// Shorter secrets might cause false positives in legitimate content.
const MIN_SECRET_LENGTH_FOR_BODY_REDACTION: usize = 8;

/// Resolved secret values registered for dynamic redaction, e.g. credentials
/// pulled from environment variables by the caller before building a
/// `Runtime`.
#[derive(Debug, Default, Clone)]
pub struct SecretContext {
    secrets: Vec<String>,
}

impl SecretContext {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a context from known secret values, deduplicated.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = String>) -> Self {
        let mut secrets: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        secrets.sort();
        secrets.dedup();
        Self { secrets }
    }

    /// Registers one more secret value.
    pub fn register(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() && !self.secrets.contains(&value) {
            self.secrets.push(value);
        }
    }

    #[must_use]
    pub fn is_secret(&self, value: &str) -> bool {
        self.secrets.iter().any(|s| s == value)
    }

    /// Redacts all occurrences of registered secrets at least
    /// `MIN_SECRET_LENGTH_FOR_BODY_REDACTION` characters long.
    #[must_use]
    pub fn redact_secrets_in_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for secret in &self.secrets {
            if secret.len() >= MIN_SECRET_LENGTH_FOR_BODY_REDACTION {
                result = result.replace(secret, "[REDACTED]");
            }
        }
        result
    }

    #[must_use]
    pub const fn has_secrets(&self) -> bool {
        !self.secrets.is_empty()
    }
}

/// Returns the canonical status text for an HTTP status code.
#[must_use]
const fn http_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

/// Checks if a header name should be redacted. Single source of truth for
/// sensitive header identification.
#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    let lower = header_name.to_lowercase();
    matches!(
        lower.as_str(),
        "authorization"
            | "proxy-authorization"
            | "x-api-key"
            | "x-api-token"
            | "api-key"
            | "api_key"
            | "x-access-token"
            | "x-auth-token"
            | "x-secret-token"
            | "token"
            | "secret"
            | "password"
            | "x-webhook-secret"
            | "cookie"
            | "set-cookie"
            | "x-csrf-token"
            | "x-xsrf-token"
            | "x-amz-security-token"
            | "private-token"
    )
}

/// Checks if a query parameter name should be redacted.
#[must_use]
fn should_redact_query_param(param_name: &str) -> bool {
    let lower = param_name.to_lowercase();
    matches!(
        lower.as_str(),
        "api_key"
            | "apikey"
            | "api-key"
            | "key"
            | "token"
            | "access_token"
            | "accesstoken"
            | "auth_token"
            | "authtoken"
            | "bearer_token"
            | "refresh_token"
            | "secret"
            | "api_secret"
            | "client_secret"
            | "password"
            | "passwd"
            | "pwd"
            | "signature"
            | "sig"
            | "session_id"
            | "sessionid"
            | "auth"
            | "authorization"
            | "credentials"
    )
}

/// Redacts sensitive query parameters from a URL, value-only.
#[must_use]
pub fn redact_url_query_params(url: &str) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };

    let base_url = &url[..query_start];
    let query_string = &url[query_start + 1..];

    let (query_part, fragment) =
        query_string
            .find('#')
            .map_or((query_string, None), |frag_start| {
                (
                    &query_string[..frag_start],
                    Some(&query_string[frag_start..]),
                )
            });

    let redacted_params: Vec<String> = query_part
        .split('&')
        .map(|param| {
            param.find('=').map_or_else(
                || param.to_string(),
                |eq_pos| {
                    let name = &param[..eq_pos];
                    if should_redact_query_param(name) {
                        format!("{name}=[REDACTED]")
                    } else {
                        param.to_string()
                    }
                },
            )
        })
        .collect();

    let mut result = format!("{base_url}?{}", redacted_params.join("&"));
    if let Some(frag) = fragment {
        result.push_str(frag);
    }
    result
}

/// Logs an HTTP request: method/URL at info, headers at debug, body at trace.
pub fn log_request(
    method: &str,
    url: &str,
    headers: Option<&reqwest::header::HeaderMap>,
    body: Option<&str>,
    secret_ctx: Option<&SecretContext>,
) {
    let redacted_url = redact_url_query_params(url);

    info!(
        target: "aperture_client::executor",
        "→ {} {}",
        method.to_uppercase(),
        redacted_url
    );

    let Some(header_map) = headers else {
        log_body_trace(body, secret_ctx, "Request body");
        return;
    };

    debug!(target: "aperture_client::executor", "Request headers:");
    for (name, value) in header_map {
        let header_str = name.as_str();
        let raw_value = String::from_utf8_lossy(value.as_bytes()).to_string();
        let display_value = redact_header_value(header_str, &raw_value, secret_ctx);
        debug!(target: "aperture_client::executor", "  {}: {}", header_str, display_value);
    }

    log_body_trace(body, secret_ctx, "Request body");
}

fn log_body_trace(body: Option<&str>, secret_ctx: Option<&SecretContext>, label: &str) {
    let Some(body_content) = body else {
        return;
    };
    let redacted_body = secret_ctx.map_or_else(
        || body_content.to_string(),
        |ctx| ctx.redact_secrets_in_text(body_content),
    );
    trace!(target: "aperture_client::executor", "{}: {}", label, redacted_body);
}

/// Redacts a header value based on static rules and dynamic secret context.
fn redact_header_value(
    header_name: &str,
    value: &str,
    secret_ctx: Option<&SecretContext>,
) -> String {
    if should_redact_header(header_name) {
        return "[REDACTED]".to_string();
    }
    if secret_ctx.is_some_and(|ctx| ctx.is_secret(value)) {
        return "[REDACTED]".to_string();
    }
    value.to_string()
}

/// Logs an HTTP response: status/duration at info, headers at debug, body
/// (truncated past `max_body_len`) at trace.
pub fn log_response(
    status: u16,
    duration_ms: u128,
    headers: Option<&reqwest::header::HeaderMap>,
    body: Option<&str>,
    max_body_len: usize,
    secret_ctx: Option<&SecretContext>,
) {
    let status_text = http_status_text(status);
    info!(
        target: "aperture_client::executor",
        "← {} {} ({}ms)",
        status,
        status_text,
        duration_ms
    );

    let Some(header_map) = headers else {
        log_response_body(body, max_body_len, secret_ctx);
        return;
    };

    debug!(target: "aperture_client::executor", "Response headers:");
    for (name, value) in header_map {
        let header_str = name.as_str();
        let raw_value = String::from_utf8_lossy(value.as_bytes()).to_string();
        let display_value = redact_header_value(header_str, &raw_value, secret_ctx);
        debug!(target: "aperture_client::executor", "  {}: {}", header_str, display_value);
    }

    log_response_body(body, max_body_len, secret_ctx);
}

fn log_response_body(body: Option<&str>, max_body_len: usize, secret_ctx: Option<&SecretContext>) {
    let Some(body_content) = body else {
        return;
    };

    let redacted_body = secret_ctx.map_or_else(
        || body_content.to_string(),
        |ctx| ctx.redact_secrets_in_text(body_content),
    );

    if redacted_body.len() > max_body_len {
        trace!(
            target: "aperture_client::executor",
            "Response body: {} (truncated at {} chars)",
            &redacted_body[..max_body_len],
            max_body_len
        );
    } else {
        trace!(target: "aperture_client::executor", "Response body: {}", redacted_body);
    }
}

/// Gets the maximum body length to log from `APERTURE_LOG_MAX_BODY`.
#[must_use]
pub fn get_max_body_len() -> usize {
    std::env::var(crate::constants::ENV_LOG_MAX_BODY)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}
