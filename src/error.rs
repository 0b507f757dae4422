//! Error handling for aperture-client.
//!
//! All application errors collapse into one of the six `ErrorKind`
//! categories from the error-handling design (§7): `Contract`,
//! `Configuration`, `Retryable`, `Decode`, `Http`, plus a catch-all
//! `Runtime`. Each can carry structured JSON details and a suggestion via
//! `ErrorContext`, and can be serialized for programmatic consumption.

use serde_json::json;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error categories from the error-handling design (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised at parse time only: a malformed operation declaration.
    Contract,
    /// Absolute/relative URI violations, missing method, duplicate map args.
    Configuration,
    /// Transport I/O failure or a status-code converted to retryable.
    Retryable,
    /// Body could not be parsed into the declared return type.
    Decode,
    /// Non-2xx status not covered by the 404 special case.
    Http,
    /// Everything else (runtime bookkeeping, registry lookups).
    Runtime,
}

/// Additional context for an `Error::Internal`.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub details: Option<serde_json::Value>,
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(
        details: Option<serde_json::Value>,
        suggestion: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            details,
            suggestion,
        }
    }

    #[must_use]
    pub fn with_detail(key: &str, value: impl serde::Serialize) -> Self {
        Self {
            details: Some(json!({ key: value })),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn and_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(Cow::Owned(suggestion.into()));
        self
    }
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "Contract",
            Self::Configuration => "Configuration",
            Self::Retryable => "Retryable",
            Self::Decode => "Decode",
            Self::Http => "Http",
            Self::Runtime => "Runtime",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Machine-readable form, for consumers reporting errors the way the
    /// teacher's CLI does under `--json-errors`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let Self::Internal { kind, message, context } = self else {
            return json!({ "error_type": ErrorKind::Runtime.as_str(), "message": self.to_string() });
        };
        let mut value = json!({
            "error_type": kind.as_str(),
            "message": message.as_ref(),
        });
        if let Some(ctx) = context {
            if let Some(details) = &ctx.details {
                value["details"] = details.clone();
            }
            if let Some(suggestion) = &ctx.suggestion {
                value["suggestion"] = json!(suggestion.as_ref());
            }
        }
        value
    }

    // ---- Contract errors (§4.4, fail fast at parse time) ----

    pub fn contract_duplicate_body(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': body parameters cannot be used with form parameters"
            )),
            context: Some(
                ErrorContext::with_detail("operation", &operation).and_suggestion(
                    "declare either a single body argument or named form parameters, not both",
                ),
            ),
        }
    }

    pub fn contract_duplicate_query_map(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': at most one query-map argument is allowed"
            )),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn contract_duplicate_header_map(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': at most one header-map argument is allowed"
            )),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn contract_unknown_method(
        operation: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let method = method.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': unrecognized HTTP method '{method}'"
            )),
            context: Some(
                ErrorContext::new(
                    Some(json!({ "operation": operation, "method": method })),
                    None,
                )
                .and_suggestion("use one of GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS"),
            ),
        }
    }

    pub fn contract_missing_method(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': no HTTP method could be determined"
            )),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn contract_unresolvable_variable(
        operation: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let name = name.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "operation '{operation}': template variable '{{{name}}}' is not bound by any argument"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "operation": operation, "variable": name })),
                Some(Cow::Borrowed(
                    "bind the variable with a named parameter or a map-typed argument",
                )),
            )),
        }
    }

    pub fn contract_generic_interface(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "interface '{name}' declares generic type parameters, which is not allowed"
            )),
            context: Some(ErrorContext::with_detail("interface", &name)),
        }
    }

    pub fn contract_too_many_superinterfaces(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "interface '{name}' declares more than one super-interface"
            )),
            context: Some(ErrorContext::with_detail("interface", &name)),
        }
    }

    pub fn contract_duplicate_config_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::Internal {
            kind: ErrorKind::Contract,
            message: Cow::Owned(format!(
                "config key '{key}' is declared on both the super-interface and the interface"
            )),
            context: Some(
                ErrorContext::with_detail("config_key", &key)
                    .and_suggestion("operations cannot be overridden between interfaces"),
            ),
        }
    }

    // ---- Configuration errors (§4.3, §4.8) ----

    pub fn configuration_error(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(format!("invalid configuration: {reason}")),
            context: Some(ErrorContext::with_detail("reason", &reason)),
        }
    }

    pub fn target_requires_absolute_url(template: impl Into<String>) -> Self {
        let template = template.into();
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(format!(
                "relative template '{template}' has no target and the configured target requires an absolute URL"
            )),
            context: Some(
                ErrorContext::with_detail("template", &template)
                    .and_suggestion("set a hard-coded target or provide an absolute URL argument"),
            ),
        }
    }

    pub fn absolute_url_rejected(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(format!(
                "absolute URL '{value}' is not permitted for a relative-only setter"
            )),
            context: Some(ErrorContext::with_detail("value", &value)),
        }
    }

    pub fn resolve_before_request(template_state: impl Into<String>) -> Self {
        let template_state = template_state.into();
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(format!(
                "template is not resolved ({template_state}); call resolve() before request()"
            )),
            context: None,
        }
    }

    #[must_use]
    pub fn mutate_after_resolve() -> Self {
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Borrowed("cannot mutate a request template after it has been resolved"),
            context: None,
        }
    }

    pub fn invalid_regex_constraint(
        name: impl Into<String>,
        value: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let value = value.into();
        let pattern = pattern.into();
        Self::Internal {
            kind: ErrorKind::Configuration,
            message: Cow::Owned(format!(
                "value '{value}' for template variable '{name}' does not match constraint /{pattern}/"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "variable": name, "value": value, "pattern": pattern })),
                None,
            )),
        }
    }

    // ---- Retryable / Http / Decode (§4.7, §4.9) ----

    pub fn retryable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Retryable,
            message: Cow::Owned(format!("retryable failure: {reason}")),
            context: None,
        }
    }

    pub fn retryable_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Retryable,
            message: Cow::Owned(format!("status {status} marked retryable: {reason}")),
            context: Some(ErrorContext::with_detail("status", status)),
        }
    }

    pub fn retry_limit_exceeded(max_attempts: u32, last_error: impl Into<String>) -> Self {
        let last_error = last_error.into();
        Self::Internal {
            kind: ErrorKind::Retryable,
            message: Cow::Owned(format!(
                "retry limit exceeded after {max_attempts} attempts: {last_error}"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "max_attempts": max_attempts, "last_error": last_error })),
                Some(Cow::Borrowed(
                    "check connectivity to the target or raise max_attempts",
                )),
            )),
        }
    }

    pub fn http_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.len() <= 200 && !body.is_empty() {
            format!("HTTP {status}: {body}")
        } else {
            format!("HTTP {status}")
        };
        Self::Internal {
            kind: ErrorKind::Http,
            message: Cow::Owned(message),
            context: Some(ErrorContext::new(
                Some(json!({ "status": status, "body": body })),
                None,
            )),
        }
    }

    pub fn decode_error(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Decode,
            message: Cow::Owned(format!("failed to decode response body: {reason}")),
            context: None,
        }
    }

    pub fn response_read_error(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Decode,
            message: Cow::Owned(format!("failed to read response: {reason}")),
            context: None,
        }
    }

    // ---- Runtime ----

    pub fn operation_not_found(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Owned(format!("operation '{operation}' not found in registry")),
            context: Some(ErrorContext::with_detail("operation", &operation)),
        }
    }

    pub fn fallback_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        let operation = operation.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Owned(format!(
                "fallback for operation '{operation}' also failed: {reason}"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "operation": operation, "reason": reason })),
                None,
            )),
        }
    }
}
