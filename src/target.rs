//! Target strategy (§4.8): supplies the absolute base URL a request
//! template is missing. Applied once per retry attempt, so a load-
//! balancer-aware variant can pick a different endpoint on each one.

use crate::config::EnvironmentOverrides;
use crate::error::Error;
use crate::request_template::RequestTemplate;

/// A stable name plus (optionally) an absolute base URL for one interface.
pub trait Target: Send + Sync {
    /// The interface this target applies to, for diagnostics.
    fn name(&self) -> &str;

    /// Mutates `template`'s `target` for attempt `attempt` (1-indexed, so a
    /// load-balanced variant can vary the endpoint per retry).
    fn apply(&self, template: &mut RequestTemplate, attempt: u32) -> Result<(), Error>;
}

/// Injects a fixed base URL into any template whose path does not already
/// start with `http` (§4.8).
#[derive(Debug, Clone)]
pub struct HardCodedTarget {
    name: String,
    base_url: String,
}

impl HardCodedTarget {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { name: name.into(), base_url: base_url.into() }
    }

    /// Resolution priority (adapted from the teacher's `BaseUrlResolver`):
    /// explicit override, then the `APERTURE_BASE_URL` environment
    /// variable, then `environment`'s per-environment override, then
    /// `fallback`.
    #[must_use]
    pub fn resolve(name: impl Into<String>, explicit: Option<&str>, environment: &EnvironmentOverrides, fallback: &str) -> Self {
        let base_url = explicit
            .map(str::to_string)
            .or_else(|| std::env::var(crate::constants::ENV_APERTURE_BASE_URL).ok())
            .or_else(|| environment.resolve().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string());
        Self::new(name, base_url)
    }
}

impl Target for HardCodedTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, template: &mut RequestTemplate, _attempt: u32) -> Result<(), Error> {
        if !template.uri_source().starts_with("http") {
            template.set_target(self.base_url.clone())?;
        }
        Ok(())
    }
}

/// Requires every template to already carry an absolute URL (§4.8).
#[derive(Debug, Clone)]
pub struct EmptyTarget {
    name: String,
}

impl EmptyTarget {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Target for EmptyTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, template: &mut RequestTemplate, _attempt: u32) -> Result<(), Error> {
        if template.uri_source().starts_with("http") {
            Ok(())
        } else {
            Err(Error::target_requires_absolute_url(template.uri_source()))
        }
    }
}
