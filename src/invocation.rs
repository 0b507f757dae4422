//! Invocation model for the execution engine (§4.6/§4.7): decouples the
//! executor from any specific call-site framework. An [`OperationCall`]
//! plus an [`ExecutionContext`] goes in; an [`ExecutionResult`] comes out.

use crate::request_template::Request;
use crate::template_builder::Argv;
use indexmap::IndexMap;
use serde_json::Value;

/// One HTTP operation to invoke, identified by the identity string the
/// contract parser assigned its metadata (§3).
#[derive(Debug, Clone)]
pub struct OperationCall {
    pub operation_id: String,
    pub argv: Argv,
}

impl OperationCall {
    #[must_use]
    pub fn new(operation_id: impl Into<String>, argv: Argv) -> Self {
        Self { operation_id: operation_id.into(), argv }
    }
}

/// Execution-time context orthogonal to the operation itself.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// If true, build and resolve the request but never send it; the
    /// executor returns `ExecutionResult::DryRun` with what would have
    /// been sent.
    pub dry_run: bool,
}

/// What the synchronous method handler produced (§4.7 step d).
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Decoded JSON body for a 2xx (or a 404 under `decode404`, where the
    /// value is `Value::Null`).
    Decoded { status: u16, body: Value, headers: IndexMap<String, Vec<String>> },
    /// The operation's declared return type was the raw response: the
    /// caller owns the body and its close.
    Raw { status: u16, body: Vec<u8>, headers: IndexMap<String, Vec<String>> },
    /// `dry_run` was set: the request that would have been sent.
    DryRun { request: Request },
    /// A 404 under `decode404` with a void return type, or any branch with
    /// nothing meaningful to decode.
    Empty,
}
