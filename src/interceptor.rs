//! Interceptor chain (§4.7 step 3a, §5): each interceptor may mutate a
//! request template's headers, query, or URI before it's sent. Applied in
//! registration order on every attempt, including retries, so interceptors
//! must be idempotent with respect to the mutations they perform.

use crate::error::Error;
use crate::request_template::RequestTemplate;

/// A single request-mutating step in the chain.
pub trait Interceptor: Send + Sync {
    /// Mutates `template` in place. Called once per attempt; implementors
    /// that are not naturally idempotent (e.g. "add a header with a fresh
    /// random value") should guard with an "already applied" check.
    fn apply(&self, template: &mut RequestTemplate) -> Result<(), Error>;
}

/// An ordered, immutable list of interceptors shared across invocations.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn apply_all(&self, template: &mut RequestTemplate) -> Result<(), Error> {
        for interceptor in &self.interceptors {
            interceptor.apply(template)?;
        }
        Ok(())
    }
}

/// Sets a header to a fixed value if not already present; naturally
/// idempotent since re-applying it on a retry is a no-op observationally.
pub struct StaticHeader {
    name: String,
    value: String,
}

impl StaticHeader {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

impl Interceptor for StaticHeader {
    fn apply(&self, template: &mut RequestTemplate) -> Result<(), Error> {
        if !template.has_header(&self.name) {
            template.set_header(self.name.clone(), self.value.clone())?;
        }
        Ok(())
    }
}
