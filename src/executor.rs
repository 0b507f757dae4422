//! Synchronous method handler pipeline (§4.6/§4.7): the single call-site
//! every declared HTTP operation funnels through once its template has been
//! prepared. Blocking in spirit (one invocation occupies the caller until it
//! completes or exhausts retries); modeled as `async fn` since that is the
//! idiomatic Rust analog of "occupies the caller" under a cooperative
//! scheduler, and matches the teacher's `tokio`+`reqwest` stack.

use crate::config::{ClientConfig, ExceptionPropagationPolicy, LogLevel};
use crate::contract::OperationMetadata;
use crate::error::Error;
use crate::interceptor::InterceptorChain;
use crate::invocation::{ExecutionContext, ExecutionResult};
use crate::logging::{self, SecretContext};
use crate::request_template::Request;
use crate::resilience::{is_retryable_status, parse_retry_after, Retryer};
use crate::target::Target;
use crate::template_builder::{finalize_request, prepare_template, ArgValue, Argv, ExpanderRegistry};
use indexmap::IndexMap;
use reqwest::Client;
use std::time::{Duration, Instant};

/// Bodies up to this size are buffered in full for a raw-response return
/// type when `close_after_decode` is set (§4.7 step d; the "eager release"
/// tier of that flag). Larger bodies are still buffered here rather than
/// streamed: `ExecutionResult::Raw` models an owned buffer, not a stream
/// handle, so true streamed hand-off to the caller is out of scope; the
/// `close_after_decode == false` path buffers the whole body uncapped
/// instead, the closest analog this crate has to "don't eagerly release/
/// truncate the body for a lazy decoder".
const RAW_BODY_BUFFER_LIMIT: usize = 8 * 1024;

/// What the caller's declared return type requires the pipeline to
/// produce. Rust has no runtime reflection of a generic return type, so the
/// call site supplies this instead of `OperationMetadata` carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Raw response: headers/status/body pass straight through.
    Raw,
    /// Decode a 2xx (or 404-under-`decode404`) body into JSON.
    Decode,
    /// Void return type: nothing meaningful to decode.
    Empty,
}

/// Runs one operation invocation end to end (§4.7).
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    client: &Client,
    metadata: &OperationMetadata,
    argv: &Argv,
    expanders: &ExpanderRegistry,
    interceptors: &InterceptorChain,
    target: &dyn Target,
    config: &ClientConfig,
    context: &ExecutionContext,
    mode: ResponseMode,
) -> Result<ExecutionResult, Error> {
    // Step 1: build template from args; a dedicated options argument
    // overrides the operation's default timeouts.
    let (prepared, vars) = prepare_template(metadata, argv, expanders)?;
    let options = call_options(metadata, argv, config);

    // Step 2: clone the retryer (per-invocation state, §5).
    let mut retryer = config.retryer();
    let secret_ctx = SecretContext::empty();

    loop {
        // Step 3a/3b: interceptors then target strategy mutate a fresh
        // clone of the unresolved template, per attempt.
        let mut template = prepared.clone();
        interceptors.apply_all(&mut template)?;
        target.apply(&mut template, retryer.attempt())?;

        let request = finalize_request(template, &vars, metadata, argv)?;

        if context.dry_run {
            return Ok(ExecutionResult::DryRun { request });
        }

        log_outgoing(config.log_level, &request, &secret_ctx);
        let started = Instant::now();

        // Step 3c: send via the transport.
        let response = match send(client, &request, &options).await {
            Ok(response) => response,
            Err(error) => match retryer.retry(error, None) {
                Ok(interval) => {
                    tokio::time::sleep(interval).await;
                    continue;
                }
                Err(root_cause) => return Err(finalize_error(root_cause, &retryer, config)),
            },
        };

        let status = response.status().as_u16();
        let header_map = response.headers().clone();
        let headers = response_headers(&header_map);
        let retry_after = header_map
            .get(crate::constants::HEADER_RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        // Step 3d: inspect status.
        if (200..300).contains(&status) {
            return decode_success(
                response,
                status,
                headers,
                &header_map,
                mode,
                config.log_level,
                started,
                &secret_ctx,
                config.close_after_decode,
            )
            .await;
        }

        if status == 404 && config.decode404 {
            let _ = response.bytes().await;
            log_incoming(config.log_level, status, started, Some(&header_map), None, &secret_ctx);
            return Ok(match mode {
                ResponseMode::Empty => ExecutionResult::Empty,
                _ => ExecutionResult::Decoded { status, body: serde_json::Value::Null, headers },
            });
        }

        let body = response.bytes().await.map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
        log_incoming(config.log_level, status, started, Some(&header_map), Some(&body), &secret_ctx);

        if is_retryable_status(status) {
            let error = Error::retryable_status(status, body);
            match retryer.retry(error, retry_after) {
                Ok(interval) => {
                    tokio::time::sleep(interval).await;
                    continue;
                }
                Err(root_cause) => return Err(finalize_error(root_cause, &retryer, config)),
            }
        }

        // Step 3d else-branch: the error decoder. This runtime has no
        // user-pluggable decoder hook (§9 open question); any non-2xx,
        // non-retryable status becomes a terminal Http error.
        return Err(Error::http_error(status, body));
    }
}

/// Reads a per-call options argument if the operation declared one,
/// falling back to the client's configured defaults. `follow_redirects` and
/// `connect_timeout_millis` are fixed at client-construction time in
/// `reqwest`; only the read timeout can be overridden per request here.
fn call_options<'a>(metadata: &OperationMetadata, argv: &'a Argv, config: &'a ClientConfig) -> std::borrow::Cow<'a, crate::config::RequestOptions> {
    match metadata.options_arg_index.and_then(|idx| argv.get(idx)) {
        Some(ArgValue::Options(options)) => std::borrow::Cow::Owned(options.clone()),
        _ => std::borrow::Cow::Borrowed(&config.options),
    }
}

async fn send(client: &Client, request: &Request, options: &crate::config::RequestOptions) -> Result<reqwest::Response, Error> {
    let method: reqwest::Method = request
        .method
        .parse()
        .map_err(|_| Error::configuration_error(format!("unsupported HTTP method: {}", request.method)))?;
    let mut builder = client.request(method, request.url.as_str()).timeout(Duration::from_millis(options.read_timeout_millis));
    for (name, values) in &request.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    builder.send().await.map_err(|e| Error::retryable(e.to_string()))
}

#[allow(clippy::too_many_arguments)]
async fn decode_success(
    response: reqwest::Response,
    status: u16,
    headers: IndexMap<String, Vec<String>>,
    raw_headers: &reqwest::header::HeaderMap,
    mode: ResponseMode,
    log_level: LogLevel,
    started: Instant,
    secret_ctx: &SecretContext,
    close_after_decode: bool,
) -> Result<ExecutionResult, Error> {
    match mode {
        ResponseMode::Raw => {
            let bytes = response.bytes().await.map_err(|e| Error::response_read_error(e.to_string()))?;
            log_incoming(log_level, status, started, Some(raw_headers), None, secret_ctx);
            let body = if close_after_decode {
                bytes.into_iter().take(RAW_BODY_BUFFER_LIMIT).collect()
            } else {
                bytes.into_iter().collect()
            };
            Ok(ExecutionResult::Raw { status, body, headers })
        }
        ResponseMode::Empty => {
            let _ = response.bytes().await;
            log_incoming(log_level, status, started, Some(raw_headers), None, secret_ctx);
            Ok(ExecutionResult::Empty)
        }
        ResponseMode::Decode => {
            let bytes = response.bytes().await.map_err(|e| Error::response_read_error(e.to_string()))?;
            let text = String::from_utf8_lossy(&bytes).into_owned();
            log_incoming(log_level, status, started, Some(raw_headers), Some(&text), secret_ctx);
            if text.trim().is_empty() {
                return Ok(ExecutionResult::Decoded { status, body: serde_json::Value::Null, headers });
            }
            let body = serde_json::from_str(&text).map_err(|e| Error::decode_error(e.to_string()))?;
            Ok(ExecutionResult::Decoded { status, body, headers })
        }
    }
}

fn finalize_error(root_cause: Error, retryer: &Retryer, config: &ClientConfig) -> Error {
    match config.exception_propagation_policy {
        ExceptionPropagationPolicy::Unwrap => root_cause,
        ExceptionPropagationPolicy::None => Error::retry_limit_exceeded(retryer.attempt(), root_cause.to_string()),
    }
}

fn response_headers(headers: &reqwest::header::HeaderMap) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string()).or_default().push(value);
    }
    map
}

/// Builds a `reqwest::HeaderMap` from a resolved request's headers, for
/// logging only; a name/value this crate could not encode into the wire
/// format it would end up rejecting at send time, so it is skipped here too.
fn to_header_map(headers: &IndexMap<String, Vec<String>>) -> reqwest::header::HeaderMap {
    let mut map = reqwest::header::HeaderMap::new();
    for (name, values) in headers {
        let Ok(header_name) = reqwest::header::HeaderName::from_bytes(name.as_bytes()) else { continue };
        for value in values {
            if let Ok(header_value) = reqwest::header::HeaderValue::from_str(value) {
                map.append(header_name.clone(), header_value);
            }
        }
    }
    map
}

fn log_outgoing(log_level: LogLevel, request: &Request, secret_ctx: &SecretContext) {
    if log_level == LogLevel::None {
        return;
    }
    let header_map = (log_level >= LogLevel::Headers).then(|| to_header_map(&request.headers));
    let body = (log_level == LogLevel::Full).then(|| request.body.as_deref().map(String::from_utf8_lossy)).flatten();
    logging::log_request(&request.method, &request.url, header_map.as_ref(), body.as_deref(), Some(secret_ctx));
}

fn log_incoming(
    log_level: LogLevel,
    status: u16,
    started: Instant,
    headers: Option<&reqwest::header::HeaderMap>,
    body: Option<&str>,
    secret_ctx: &SecretContext,
) {
    if log_level == LogLevel::None {
        return;
    }
    let headers = (log_level >= LogLevel::Headers).then_some(headers).flatten();
    let body = if log_level == LogLevel::Full { body } else { None };
    logging::log_response(status, started.elapsed().as_millis(), headers, body, logging::get_max_body_len(), Some(secret_ctx));
}
