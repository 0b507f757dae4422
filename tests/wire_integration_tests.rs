use aperture_client::config::{ClientConfig, RetryerConfig};
use aperture_client::contract::{InterfaceDecl, OperationDecl, ParamRole};
use aperture_client::interceptor::{InterceptorChain, StaticHeader};
use aperture_client::request_template::CollectionFormat;
use aperture_client::target::HardCodedTarget;
use aperture_client::template_builder::{ArgValue, Argv, ExpanderRegistry};
use aperture_client::{ExecutionContext, ExecutionResult, OperationCall, ResponseMode, Runtime};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime_for(server: &MockServer, interfaces: Vec<InterfaceDecl>, config: ClientConfig) -> Runtime {
    Runtime::build(
        &interfaces,
        Box::new(HardCodedTarget::new("api", server.uri())),
        InterceptorChain::new(),
        config,
        ExpanderRegistry::new(),
    )
    .unwrap()
}

/// Matches the parser's own `identity` format (`contract::parser`), so
/// tests don't need a separate lookup API just to name the one operation
/// they declared.
fn identity(name: &str, request_line: &str) -> String {
    format!("{name}#{request_line}")
}

#[tokio::test]
async fn decodes_a_json_body_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/netflix/feign/contributors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"login": "velvia"}])))
        .mount(&server)
        .await;

    let line = "GET /repos/{owner}/{repo}/contributors";
    let interfaces = vec![InterfaceDecl::new("GitHub").with_operation(
        OperationDecl::new("contributors", line)
            .with_param(0, ParamRole::Named { name: "owner".into(), expander: None, encoded: false })
            .with_param(1, ParamRole::Named { name: "repo".into(), expander: None, encoded: false }),
    )];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let argv = Argv::new().with(0, ArgValue::Scalar("netflix".into())).with(1, ArgValue::Scalar("feign".into()));
    let result = runtime
        .invoke(OperationCall::new(identity("contributors", line), argv), &ExecutionContext::default(), ResponseMode::Decode)
        .await
        .unwrap();
    match result {
        ExecutionResult::Decoded { status, body, .. } => {
            assert_eq!(status, 200);
            assert_eq!(body[0]["login"], "velvia");
        }
        other => panic!("expected Decoded, got {other:?}"),
    }
}

#[tokio::test]
async fn exploded_query_param_sends_repeated_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tag", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let line = "GET /search?tag={tag}";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(
        OperationDecl::new("search", line)
            .with_param(0, ParamRole::Named { name: "tag".into(), expander: None, encoded: false }),
    )];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let argv = Argv::new().with(0, ArgValue::Iterable(vec!["a".into(), "b".into()]));
    let result = runtime
        .invoke(OperationCall::new(identity("search", line), argv), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn csv_collection_format_joins_values_with_commas() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tag", "a,b"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let line = "GET /search?tag={tag}";
    let op = OperationDecl {
        collection_format: CollectionFormat::Csv,
        ..OperationDecl::new("search", line)
            .with_param(0, ParamRole::Named { name: "tag".into(), expander: None, encoded: false })
    };
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(op)];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let argv = Argv::new().with(0, ArgValue::Iterable(vec!["a".into(), "b".into()]));
    let result = runtime
        .invoke(OperationCall::new(identity("search", line), argv), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn a_404_is_reported_as_empty_when_decode404_is_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/missing")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let line = "GET /missing";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("get", line))];
    let config = ClientConfig { decode404: true, ..ClientConfig::default() };
    let runtime = runtime_for(&server, interfaces, config);
    let result = runtime
        .invoke(OperationCall::new(identity("get", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn a_404_without_decode404_is_a_terminal_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/missing")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let line = "GET /missing";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("get", line))];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let result = runtime
        .invoke(OperationCall::new(identity("get", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Empty)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn a_503_is_retried_until_the_server_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let line = "GET /flaky";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("get", line))];
    let config = ClientConfig {
        retryer_config: Some(RetryerConfig { period_millis: 1, max_period_millis: 5, max_attempts: 5 }),
        ..ClientConfig::default()
    };
    let runtime = runtime_for(&server, interfaces, config);
    let result = runtime
        .invoke(OperationCall::new(identity("get", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Decode)
        .await
        .unwrap();
    match result {
        ExecutionResult::Decoded { status, .. } => assert_eq!(status, 200),
        other => panic!("expected Decoded, got {other:?}"),
    }
}

#[tokio::test]
async fn retries_exhaust_into_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/down")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let line = "GET /down";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("get", line))];
    let config = ClientConfig {
        retryer_config: Some(RetryerConfig { period_millis: 1, max_period_millis: 2, max_attempts: 2 }),
        ..ClientConfig::default()
    };
    let runtime = runtime_for(&server, interfaces, config);
    let result = runtime
        .invoke(OperationCall::new(identity("get", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Empty)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn static_header_interceptor_is_sent_on_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("X-Request-Source", "aperture"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let line = "GET /ping";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("ping", line))];
    let runtime = Runtime::build(
        &interfaces,
        Box::new(HardCodedTarget::new("api", server.uri())),
        InterceptorChain::new().with(StaticHeader::new("X-Request-Source", "aperture")),
        ClientConfig::default(),
        ExpanderRegistry::new(),
    )
    .unwrap();
    let result = runtime
        .invoke(OperationCall::new(identity("ping", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn form_encoded_body_reaches_the_server_url_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/things"))
        .and(body_string("title=hello%20world"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let line = "POST /things";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(
        OperationDecl::new("create", line)
            .with_param(0, ParamRole::Named { name: "title".into(), expander: None, encoded: false }),
    )];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let argv = Argv::new().with(0, ArgValue::Scalar("hello world".into()));
    let result = runtime
        .invoke(OperationCall::new(identity("create", line), argv), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn query_map_argument_is_merged_in_after_declared_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("extra", "1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let line = "GET /search";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(
        OperationDecl::new("search", line).with_param(0, ParamRole::QueryMap { encoded: false }),
    )];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let mut map = indexmap::IndexMap::new();
    map.insert("extra".to_string(), "1".to_string());
    let argv = Argv::new().with(0, ArgValue::Map(map));
    let result = runtime
        .invoke(OperationCall::new(identity("search", line), argv), &ExecutionContext::default(), ResponseMode::Empty)
        .await
        .unwrap();
    assert!(matches!(result, ExecutionResult::Empty));
}

#[tokio::test]
async fn close_after_decode_false_buffers_a_raw_body_past_the_truncation_cap() {
    let server = MockServer::start().await;
    let big_body = "x".repeat(9 * 1024);
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_string(big_body.clone()))
        .mount(&server)
        .await;

    let line = "GET /blob";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("blob", line))];
    let config = ClientConfig { close_after_decode: false, ..ClientConfig::default() };
    let runtime = runtime_for(&server, interfaces, config);
    let result = runtime
        .invoke(OperationCall::new(identity("blob", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Raw)
        .await
        .unwrap();
    match result {
        ExecutionResult::Raw { body, .. } => assert_eq!(body.len(), big_body.len()),
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[tokio::test]
async fn close_after_decode_true_truncates_a_raw_body_at_the_cap() {
    let server = MockServer::start().await;
    let big_body = "x".repeat(9 * 1024);
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_string(big_body))
        .mount(&server)
        .await;

    let line = "GET /blob";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("blob", line))];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let result = runtime
        .invoke(OperationCall::new(identity("blob", line), Argv::new()), &ExecutionContext::default(), ResponseMode::Raw)
        .await
        .unwrap();
    match result {
        ExecutionResult::Raw { body, .. } => assert_eq!(body.len(), 8 * 1024),
        other => panic!("expected Raw, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_never_reaches_the_mock_server() {
    // No mock registered: if the request actually left the process,
    // wiremock's default 404 response would surface as a terminal error
    // instead of a `DryRun` result.
    let server = MockServer::start().await;
    let line = "GET /ping";
    let interfaces = vec![InterfaceDecl::new("Api").with_operation(OperationDecl::new("ping", line))];
    let runtime = runtime_for(&server, interfaces, ClientConfig::default());
    let context = ExecutionContext { dry_run: true };
    let result = runtime
        .invoke(OperationCall::new(identity("ping", line), Argv::new()), &context, ResponseMode::Empty)
        .await
        .unwrap();
    match result {
        ExecutionResult::DryRun { request } => assert_eq!(request.url, format!("{}/ping", server.uri())),
        other => panic!("expected DryRun, got {other:?}"),
    }
}
