//! Circuit-breaker / fallback wrapper (§4.10, external collaborator —
//! interface only). No circuit-breaking library is vendored; this models
//! the command shape a Hystrix-style collaborator would expose around the
//! pipeline in `executor.rs`, so a real breaker can be dropped in at the
//! same seam without touching invocation code.

use crate::error::Error;
use crate::invocation::ExecutionResult;
use std::future::Future;
use std::pin::Pin;

/// A fallback factory: receives the execution exception and produces a
/// substitute result satisfying the same interface. Reactive/future-bearing
/// fallback values are materialized to a concrete value here, since the
/// declared return type in scope is always synchronous (§9 open question).
pub type FallbackFactory =
    dyn Fn(&Error) -> Pin<Box<dyn Future<Output = Result<ExecutionResult, Error>> + Send>> + Send + Sync;

/// One operation's command identity: a group key shared by every operation
/// on the same interface, and a command key derived from the operation's
/// own identity string.
#[derive(Debug, Clone)]
pub struct CommandKey {
    pub group_key: String,
    pub command_key: String,
}

impl CommandKey {
    #[must_use]
    pub fn new(group_key: impl Into<String>, operation_identity: impl Into<String>) -> Self {
        Self { group_key: group_key.into(), command_key: operation_identity.into() }
    }
}

/// Wraps one operation's pipeline call with an optional fallback.
pub struct Command {
    key: CommandKey,
    fallback: Option<Box<FallbackFactory>>,
}

impl Command {
    #[must_use]
    pub fn new(key: CommandKey) -> Self {
        Self { key, fallback: None }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Fn(&Error) -> Pin<Box<dyn Future<Output = Result<ExecutionResult, Error>> + Send>> + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    #[must_use]
    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// Runs `run` (the pipeline call); on failure, invokes the fallback
    /// factory if one is registered, otherwise propagates the original
    /// error. If the fallback itself fails, that failure wins.
    pub async fn execute<F, Fut>(&self, run: F) -> Result<ExecutionResult, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExecutionResult, Error>>,
    {
        match run().await {
            Ok(result) => Ok(result),
            Err(error) => match &self.fallback {
                Some(fallback) => fallback(&error)
                    .await
                    .map_err(|reason| Error::fallback_failed(&self.key.command_key, reason.to_string())),
                None => Err(error),
            },
        }
    }
}
