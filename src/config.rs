//! Builder-style configuration (§6, ambient stack): everything a runtime
//! needs besides the contract and the transport itself.

use crate::resilience::{Retryer, RetryerConfig};
use serde::{Deserialize, Serialize};

/// Amount logged per request (§6). Ordered low to high so callers can gate
/// on `log_level >= LogLevel::Headers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    None,
    Basic,
    Headers,
    Full,
}

/// Whether to unwrap the root cause when retries exhaust (§6/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionPropagationPolicy {
    #[default]
    None,
    Unwrap,
}

/// `{connectTimeoutMillis, readTimeoutMillis, followRedirects}` (§6), with a
/// per-call override point via a dedicated options argument (§4.7 step 1).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub connect_timeout_millis: u64,
    pub read_timeout_millis: u64,
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { connect_timeout_millis: 10_000, read_timeout_millis: 30_000, follow_redirects: true }
    }
}

/// Per-environment base-URL overrides, read from `APERTURE_ENV` unless
/// explicitly set (adapted from the teacher's `BaseUrlResolver`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnvironmentOverrides {
    #[serde(default)]
    pub urls: std::collections::HashMap<String, String>,
    #[serde(skip)]
    pub current: Option<String>,
}

impl EnvironmentOverrides {
    #[must_use]
    pub fn from_process_env() -> Self {
        Self { urls: std::collections::HashMap::new(), current: std::env::var(crate::constants::ENV_APERTURE_ENV).ok() }
    }

    #[must_use]
    pub fn resolve(&self) -> Option<&str> {
        self.current.as_deref().and_then(|env| self.urls.get(env)).map(String::as_str)
    }
}

/// The full set of builder options for one client (§6).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub log_level: LogLevel,
    pub decode404: bool,
    pub close_after_decode: bool,
    pub exception_propagation_policy: ExceptionPropagationPolicy,
    pub options: RequestOptions,
    pub retryer_config: Option<RetryerConfig>,
    pub environment: EnvironmentOverrides,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            decode404: false,
            close_after_decode: true,
            exception_propagation_policy: ExceptionPropagationPolicy::default(),
            options: RequestOptions::default(),
            retryer_config: Some(RetryerConfig::default()),
            environment: EnvironmentOverrides::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn retryer(&self) -> Retryer {
        match &self.retryer_config {
            Some(config) => Retryer::new(config),
            None => Retryer::never(),
        }
    }
}

/// Accumulates configuration before a `Runtime` is built (§9 ambient
/// stack, mirrors the teacher's `GlobalConfig` builder shape).
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    config: ClientConfig,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    #[must_use]
    pub const fn decode404(mut self, decode404: bool) -> Self {
        self.config.decode404 = decode404;
        self
    }

    #[must_use]
    pub const fn close_after_decode(mut self, close: bool) -> Self {
        self.config.close_after_decode = close;
        self
    }

    #[must_use]
    pub const fn exception_propagation_policy(mut self, policy: ExceptionPropagationPolicy) -> Self {
        self.config.exception_propagation_policy = policy;
        self
    }

    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.config.options = options;
        self
    }

    #[must_use]
    pub fn retryer_config(mut self, config: Option<RetryerConfig>) -> Self {
        self.config.retryer_config = config;
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: EnvironmentOverrides) -> Self {
        self.config.environment = environment;
        self
    }

    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
